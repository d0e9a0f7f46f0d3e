//! Chunked content streaming.

use std::fmt;
use std::io::{self, Read};

use crate::error::FsResult;
use crate::model::ContentRef;

/// A blob read in fixed-size chunks, with the headers a response needs.
pub struct FileStream {
    reader: Box<dyn Read + Send>,
    chunk_size: usize,
    mimetype: String,
    content_length: u64,
    filename: Option<String>,
    done: bool,
}

impl FileStream {
    /// Open `content` for streaming. Opening counts as an access.
    pub fn open(content: ContentRef<'_>, chunk_size: usize) -> FsResult<Self> {
        let meta = content.meta()?;
        Ok(Self {
            reader: content.open()?,
            chunk_size: chunk_size.max(1),
            mimetype: meta.mimetype,
            content_length: meta.size,
            filename: None,
            done: false,
        })
    }

    /// Attach a download name.
    pub fn named(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The underlying reader, for callers that copy instead of iterating.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }
}

impl Iterator for FileStream {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.chunk_size);
        match (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut chunk)
        {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(chunk)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("mimetype", &self.mimetype)
            .field("content_length", &self.content_length)
            .field("filename", &self.filename)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
