//! Uniform resize to the drawing's target size.
//!
//! The larger image dimension is mapped to `target_size` pixels and the
//! other dimension follows the aspect ratio. Unlike a working-resolution
//! downsample, this always resizes: small images are enlarged so the
//! drawing has the requested extent on the surface.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom). Smooth enough that resampling does not
    /// introduce stair-step edges.
    #[default]
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Resize `image` so its larger dimension equals `target_size`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidSize`] if `target_size` is zero.
pub fn resize_to_fit(
    image: &DynamicImage,
    target_size: u32,
    filter: ResizeFilter,
) -> Result<DynamicImage, PipelineError> {
    if target_size == 0 {
        return Err(PipelineError::InvalidSize(
            "target size must be greater than zero".to_owned(),
        ));
    }
    if image.width().max(image.height()) == target_size {
        return Ok(image.clone());
    }
    Ok(image.resize(target_size, target_size, filter.to_image_filter()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([128, 128, 128, 255]),
        ))
    }

    #[test]
    fn default_filter_is_bicubic() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::CatmullRom);
    }

    #[test]
    fn zero_target_is_invalid() {
        let result = resize_to_fit(&test_image(10, 10), 0, ResizeFilter::default());
        assert!(matches!(result, Err(PipelineError::InvalidSize(_))));
    }

    #[test]
    fn landscape_downscale_preserves_aspect() {
        let resized = resize_to_fit(&test_image(1024, 768), 256, ResizeFilter::default()).unwrap();
        assert_eq!((resized.width(), resized.height()), (256, 192));
    }

    #[test]
    fn portrait_upscale_preserves_aspect() {
        let resized = resize_to_fit(&test_image(50, 100), 350, ResizeFilter::default()).unwrap();
        assert_eq!((resized.width(), resized.height()), (175, 350));
    }

    #[test]
    fn exact_size_is_unchanged() {
        let resized = resize_to_fit(&test_image(350, 200), 350, ResizeFilter::Nearest).unwrap();
        assert_eq!((resized.width(), resized.height()), (350, 200));
    }
}
