//! PDF rasterization extension point.
//!
//! Rendering pages is left to a [`PdfRasterizer`] registered at startup;
//! without one, conversion fails with `RasterizerUnavailable`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use quire_cas::sniff_mimetype;

use crate::error::FsResult;
use crate::model::split_extension;

pub const PDF: &str = "application/pdf";

/// Image format for rasterized pages.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    Png,
    Jpeg,
}

impl PageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PageFormat::Png => "png",
            PageFormat::Jpeg => "jpeg",
        }
    }
}

/// Renders each page of a PDF as an encoded image.
pub trait PdfRasterizer: Send + Sync {
    /// Encoded pages in document order.
    fn rasterize(&self, pdf: &[u8], format: PageFormat) -> FsResult<Vec<Vec<u8>>>;
}

/// Whether `bytes` look like a PDF document.
pub fn is_pdf(bytes: &[u8]) -> bool {
    sniff_mimetype(bytes) == PDF
}

/// File name for page `page` (1-based) of a document named `source`.
pub fn page_name(source: &str, page: usize, format: PageFormat) -> String {
    let (stem, _) = split_extension(source);
    format!("{stem}-page{page}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"));
        assert!(!is_pdf(b"hello"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn test_page_names() {
        assert_eq!(page_name("report.pdf", 1, PageFormat::Png), "report-page1.png");
        assert_eq!(page_name("scan", 12, PageFormat::Jpeg), "scan-page12.jpeg");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<PageFormat>().unwrap(), PageFormat::Png);
        assert_eq!("jpeg".parse::<PageFormat>().unwrap(), PageFormat::Jpeg);
        assert!("tiff".parse::<PageFormat>().is_err());
        assert_eq!(PageFormat::default().to_string(), "png");
    }
}
