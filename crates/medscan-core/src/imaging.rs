//! Image normalization before the vision model call.
//!
//! Photos are decoded, downscaled so their larger side fits the model's
//! limit, re-encoded when the declared format is not one the model accepts,
//! and written to a scoped temporary file. The file lives as long as the
//! returned [`ProcessedImage`].

use std::io::{Cursor, Write};
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use medscan_llm::ModelImage;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Largest side, in pixels, of an image sent to the model.
pub const MAX_DIMENSION: u32 = 1568;

/// Inputs above this size are rejected before decoding.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Image normalization errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image data is empty")]
    Empty,

    #[error("image data exceeds {}MB limit", MAX_IMAGE_BYTES / (1024 * 1024))]
    TooLarge(usize),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("temporary file error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Normalized image backed by a temporary file.
///
/// Dropping it deletes the file.
#[derive(Debug)]
pub struct ProcessedImage {
    file: NamedTempFile,
    width: u32,
    height: u32,
    content_type: &'static str,
}

impl ProcessedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Borrowed view handed to the model client.
    pub fn as_model_image(&self) -> ModelImage<'_> {
        ModelImage {
            path: self.path(),
            content_type: self.content_type,
            width: self.width,
            height: self.height,
        }
    }
}

/// Encoding chosen for the normalized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputFormat {
    format: ImageFormat,
    content_type: &'static str,
    extension: &'static str,
}

const JPEG: OutputFormat = OutputFormat {
    format: ImageFormat::Jpeg,
    content_type: "image/jpeg",
    extension: ".jpg",
};

/// Declared types the model does not accept and that get re-encoded as JPEG.
const NEEDS_CONVERSION: &[&str] = &["image/heic", "image/heif", "image/tiff", "image/bmp"];

/// Whether a declared content type is re-encoded before the model call.
pub fn needs_conversion(content_type: &str) -> bool {
    NEEDS_CONVERSION.contains(&essence(content_type).as_str())
}

/// MIME type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn output_format(content_type: &str) -> OutputFormat {
    match essence(content_type).as_str() {
        "image/jpeg" | "image/jpg" => JPEG,
        "image/png" => OutputFormat {
            format: ImageFormat::Png,
            content_type: "image/png",
            extension: ".png",
        },
        "image/gif" => OutputFormat {
            format: ImageFormat::Gif,
            content_type: "image/gif",
            extension: ".gif",
        },
        "image/webp" => OutputFormat {
            format: ImageFormat::WebP,
            content_type: "image/webp",
            extension: ".webp",
        },
        // Conversion set and anything unrecognized.
        _ => JPEG,
    }
}

/// Dimensions after fitting the larger side into `max_dimension`.
///
/// Never upscales. The smaller side is rounded and kept at least 1px.
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max_dimension || largest == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = (side as f64 * max_dimension as f64 / largest as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Turns uploaded photo bytes into a [`ProcessedImage`].
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_dimension: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(MAX_DIMENSION)
    }
}

impl ImageNormalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Normalize `bytes` declared as `content_type`.
    pub fn normalize(&self, bytes: &[u8], content_type: &str) -> ImageResult<ProcessedImage> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge(bytes.len()));
        }

        let source_format = image::guess_format(bytes).ok();
        let image =
            image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        let (width, height) = image.dimensions();
        let (target_width, target_height) = fit_dimensions(width, height, self.max_dimension);
        let output = output_format(content_type);
        let resized = (target_width, target_height) != (width, height);

        let encoded = if !resized && source_format == Some(output.format) {
            bytes.to_vec()
        } else {
            let image = if resized {
                image.resize_exact(target_width, target_height, FilterType::CatmullRom)
            } else {
                image
            };
            encode(image, output.format)?
        };

        debug!(
            from = format!("{width}x{height}"),
            to = format!("{target_width}x{target_height}"),
            input_bytes = bytes.len(),
            output_bytes = encoded.len(),
            content_type = output.content_type,
            "normalized scan image"
        );

        let mut file = tempfile::Builder::new()
            .prefix("medscan-")
            .suffix(output.extension)
            .tempfile()?;
        file.write_all(&encoded)?;
        file.flush()?;

        Ok(ProcessedImage {
            file,
            width: target_width,
            height: target_height,
            content_type: output.content_type,
        })
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> ImageResult<Vec<u8>> {
    // JPEG has no alpha channel; GIF and WebP encoders want 8-bit RGBA.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::Gif | ImageFormat::WebP => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => image,
    };

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, format)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, format)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_fit_dimensions_landscape() {
        assert_eq!(fit_dimensions(2000, 1000, 1568), (1568, 784));
    }

    #[test]
    fn test_fit_dimensions_portrait_rounds() {
        assert_eq!(fit_dimensions(1000, 3000, 1568), (523, 1568));
    }

    #[test]
    fn test_fit_dimensions_never_upscales() {
        assert_eq!(fit_dimensions(800, 600, 1568), (800, 600));
        assert_eq!(fit_dimensions(1568, 1568, 1568), (1568, 1568));
    }

    #[test]
    fn test_fit_dimensions_extreme_ratio() {
        assert_eq!(fit_dimensions(10_000, 2, 1568), (1568, 1));
    }

    #[test]
    fn test_conversion_set() {
        assert!(needs_conversion("image/heic"));
        assert!(needs_conversion("IMAGE/HEIF"));
        assert!(needs_conversion("image/tiff"));
        assert!(needs_conversion("image/bmp; charset=binary"));
        assert!(!needs_conversion("image/jpeg"));
        assert!(!needs_conversion("image/png"));
    }

    #[test]
    fn test_downscale_large_image() {
        let bytes = encoded(2000, 1000, ImageFormat::Png);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/png")
            .unwrap();

        assert_eq!((processed.width(), processed.height()), (1568, 784));
        assert_eq!(processed.content_type(), "image/png");
        assert!(processed.path().to_string_lossy().ends_with(".png"));

        let written = image::open(processed.path()).unwrap();
        assert_eq!(written.dimensions(), (1568, 784));
    }

    #[test]
    fn test_small_image_passes_through() {
        let bytes = encoded(40, 30, ImageFormat::Png);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/png")
            .unwrap();

        assert_eq!((processed.width(), processed.height()), (40, 30));
        assert_eq!(std::fs::read(processed.path()).unwrap(), bytes);
    }

    #[test]
    fn test_bmp_converted_to_jpeg() {
        let bytes = encoded(64, 48, ImageFormat::Bmp);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/bmp")
            .unwrap();

        assert_eq!(processed.content_type(), "image/jpeg");
        assert!(processed.path().to_string_lossy().ends_with(".jpg"));
        let written = std::fs::read(processed.path()).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_mislabelled_content_is_reencoded() {
        let bytes = encoded(32, 32, ImageFormat::Png);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/jpeg")
            .unwrap();

        let written = std::fs::read(processed.path()).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_custom_max_dimension() {
        let bytes = encoded(300, 150, ImageFormat::Png);
        let processed = ImageNormalizer::new(100)
            .normalize(&bytes, "image/png")
            .unwrap();
        assert_eq!((processed.width(), processed.height()), (100, 50));
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let bytes = encoded(16, 16, ImageFormat::Png);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/png")
            .unwrap();
        let path = processed.path().to_path_buf();
        assert!(path.exists());

        drop(processed);
        assert!(!path.exists());
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = ImageNormalizer::default()
            .normalize(b"definitely not an image", "image/jpeg")
            .unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_empty_input() {
        let err = ImageNormalizer::default()
            .normalize(&[], "image/png")
            .unwrap_err();
        assert!(matches!(err, ImageError::Empty));
    }

    #[test]
    fn test_model_image_view() {
        let bytes = encoded(20, 10, ImageFormat::Png);
        let processed = ImageNormalizer::default()
            .normalize(&bytes, "image/png")
            .unwrap();

        let view = processed.as_model_image();
        assert_eq!(view.path, processed.path());
        assert_eq!((view.width, view.height), (20, 10));
        assert_eq!(view.content_type, "image/png");
    }
}
