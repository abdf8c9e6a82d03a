use crate::error::DetectError;
use image::RgbImage;

/// Decode uploaded bytes into an RGB image, guessing the format from its magic bytes.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectError> {
    let _s = common::span_debug!("decode_image");

    let image = image::load_from_memory(bytes)?;

    tracing::trace!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        encoded_bytes = bytes.len(),
        "Decoded upload"
    );

    Ok(image.to_rgb8())
}
