//! MIME type detection from content.
//!
//! Binary formats are recognized by signature through `infer`. Everything
//! else is `text/plain` when it decodes as UTF-8 and
//! `application/octet-stream` otherwise.

/// Fallback for unrecognized binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess the MIME type of `bytes` from its leading signature.
pub fn sniff_mimetype(bytes: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(bytes) {
        kind.mime_type()
    } else if !bytes.is_empty() && std::str::from_utf8(bytes).is_ok() {
        "text/plain"
    } else {
        OCTET_STREAM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_signatures() {
        assert_eq!(sniff_mimetype(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff_mimetype(b"\xff\xd8\xff\xe0\0\x10JFIF"), "image/jpeg");
        assert_eq!(sniff_mimetype(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff_mimetype(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mimetype(b"GIF89a\x01\0\x01\0"), "image/gif");
    }

    #[test]
    fn test_text_and_binary_fallbacks() {
        assert_eq!(sniff_mimetype(b"hello"), "text/plain");
        assert_eq!(sniff_mimetype(&[0x80, 0x81, 0x82, 0x83]), OCTET_STREAM);
        assert_eq!(sniff_mimetype(b""), OCTET_STREAM);
    }
}
