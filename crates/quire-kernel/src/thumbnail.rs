//! Thumbnail sizing and rendering.
//!
//! The sizing rule lives here; pixel work sits behind [`Thumbnailer`] so a
//! deployment can swap the renderer. [`ImageThumbnailer`] is the default and
//! handles PNG and JPEG with the `image` crate.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::{FsError, FsResult};
use crate::model::Resolution;

pub const PNG: &str = "image/png";
pub const JPEG: &str = "image/jpeg";

/// Target size for a thumbnail of `source` within `bounds`, preserving the
/// aspect ratio.
///
/// Returns `None` when the source already fits inside the bounds in both
/// dimensions; the original should then be served as is. Each dimension of
/// the result is at least one pixel.
pub fn scaled_resolution(source: Resolution, bounds: Resolution) -> Option<Resolution> {
    if source.width == 0 || source.height == 0 {
        return None;
    }
    let fac_x = bounds.width as f64 / source.width as f64;
    let fac_y = bounds.height as f64 / source.height as f64;
    if fac_x >= 1.0 && fac_y >= 1.0 {
        return None;
    }

    let factor = fac_x.min(fac_y);
    let scale = |dim: u32, max: u32| ((dim as f64 * factor).round() as u32).clamp(1, max.max(1));
    Some(Resolution::new(
        scale(source.width, bounds.width),
        scale(source.height, bounds.height),
    ))
}

/// Renders scaled images.
pub trait Thumbnailer: Send + Sync {
    /// Whether content of this type can be thumbnailed.
    fn supports(&self, mimetype: &str) -> bool;

    /// Pixel dimensions of an encoded image.
    fn dimensions(&self, bytes: &[u8]) -> FsResult<Resolution>;

    /// Re-encode `bytes` scaled to exactly `size`, in the source format.
    fn render(&self, bytes: &[u8], mimetype: &str, size: Resolution) -> FsResult<Vec<u8>>;
}

/// Default renderer backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageThumbnailer;

impl ImageThumbnailer {
    fn format(mimetype: &str) -> FsResult<ImageFormat> {
        match mimetype {
            PNG => Ok(ImageFormat::Png),
            JPEG => Ok(ImageFormat::Jpeg),
            other => Err(FsError::UnsupportedFileType(other.to_string())),
        }
    }

    fn decode(bytes: &[u8]) -> FsResult<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| FsError::Conversion(e.to_string()))
    }
}

impl Thumbnailer for ImageThumbnailer {
    fn supports(&self, mimetype: &str) -> bool {
        Self::format(mimetype).is_ok()
    }

    fn dimensions(&self, bytes: &[u8]) -> FsResult<Resolution> {
        let (width, height) = Self::decode(bytes)?.dimensions();
        Ok(Resolution::new(width, height))
    }

    fn render(&self, bytes: &[u8], mimetype: &str, size: Resolution) -> FsResult<Vec<u8>> {
        let format = Self::format(mimetype)?;
        let scaled = Self::decode(bytes)?.resize_exact(size.width, size.height, FilterType::Lanczos3);
        // JPEG has no alpha channel
        let scaled = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(scaled.to_rgb8()),
            _ => scaled,
        };

        let mut out = Cursor::new(Vec::new());
        scaled
            .write_to(&mut out, format)
            .map_err(|e| FsError::Conversion(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Encode a solid PNG of the given size.
    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_fits_in_both_dimensions() {
        let source = Resolution::new(100, 50);
        assert_eq!(scaled_resolution(source, Resolution::new(100, 50)), None);
        assert_eq!(scaled_resolution(source, Resolution::new(400, 400)), None);
    }

    #[test]
    fn test_scales_by_tighter_bound() {
        let source = Resolution::new(400, 200);
        assert_eq!(
            scaled_resolution(source, Resolution::new(100, 100)),
            Some(Resolution::new(100, 50))
        );
        // Only one dimension too large still scales
        assert_eq!(
            scaled_resolution(source, Resolution::new(1000, 100)),
            Some(Resolution::new(200, 100))
        );
    }

    #[test]
    fn test_never_below_one_pixel() {
        let source = Resolution::new(1000, 2);
        assert_eq!(
            scaled_resolution(source, Resolution::new(10, 10)),
            Some(Resolution::new(10, 1))
        );
    }

    #[test]
    fn test_render_png() {
        let thumbnailer = ImageThumbnailer;
        let source = png(40, 20);
        assert_eq!(thumbnailer.dimensions(&source).unwrap(), Resolution::new(40, 20));

        let small = thumbnailer.render(&source, PNG, Resolution::new(10, 5)).unwrap();
        assert_eq!(thumbnailer.dimensions(&small).unwrap(), Resolution::new(10, 5));
    }

    #[test]
    fn test_render_jpeg() {
        let thumbnailer = ImageThumbnailer;
        let small = thumbnailer
            .render(&png(40, 20), JPEG, Resolution::new(8, 4))
            .unwrap();
        assert_eq!(&small[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_unsupported() {
        let thumbnailer = ImageThumbnailer;
        assert!(thumbnailer.supports(PNG));
        assert!(!thumbnailer.supports("image/gif"));
        assert!(matches!(
            thumbnailer.render(b"GIF89a", "image/gif", Resolution::new(1, 1)),
            Err(FsError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            thumbnailer.dimensions(b"not an image"),
            Err(FsError::Conversion(_))
        ));
    }
}
