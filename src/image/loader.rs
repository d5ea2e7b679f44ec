use crate::utils::error::DetectError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

/// Default upload limit (50MB)
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// Decodes a base64 payload, with or without a `data:image/...;base64,` prefix.
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;
        Ok(image_bytes)
    }

    /// Decodes image bytes into an RGB image, rejecting payloads over `max_bytes`.
    pub fn from_bytes_with_limit(bytes: &[u8], max_bytes: usize) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(DetectError::ModelNotReady("Image payload was empty.".to_string()));
        }

        if bytes.len() > max_bytes {
            return Err(DetectError::FileTooLarge(bytes.len(), max_bytes));
        }

        let image = image::load_from_memory(bytes)?;
        Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
    }

    /// Detects the image format from magic bytes
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// Whether uploads in `format` are accepted
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}
