//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces either the
//! decoded [`DynamicImage`] or a single-channel luminance image suitable
//! for edge detection.

use image::{DynamicImage, GrayImage};

use crate::types::PipelineError;

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::EmptyImage`] if the decoded image has a zero
/// dimension.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let image = image::load_from_memory(bytes)?;
    ensure_not_empty(&image)?;
    Ok(image)
}

/// Reject images with zero width or height.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] when either dimension is zero.
pub fn ensure_not_empty(image: &DynamicImage) -> Result<(), PipelineError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }
    Ok(())
}

/// Convert to single-channel intensity using the standard luminance
/// weights (`0.299*R + 0.587*G + 0.114*B`).
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA image as PNG bytes.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let empty = DynamicImage::new_rgba8(0, 12);
        assert!(matches!(
            ensure_not_empty(&empty),
            Err(PipelineError::EmptyImage {
                width: 0,
                height: 12
            })
        ));
    }

    #[test]
    fn png_round_trips_dimensions() {
        let img = image::RgbaImage::from_pixel(17, 31, image::Rgba([128, 64, 32, 255]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 31));
    }

    #[test]
    fn luminance_weights_green_highest() {
        let pixel = |r, g, b| {
            let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                1,
                1,
                image::Rgba([r, g, b, 255]),
            ));
            to_gray(&img).get_pixel(0, 0).0[0]
        };
        let (r, g, b) = (pixel(255, 0, 0), pixel(0, 255, 0), pixel(0, 0, 255));
        assert!(g > r && r > b, "expected green > red > blue, got {r} {g} {b}");
    }
}
