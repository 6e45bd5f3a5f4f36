//! Edge extraction: image bytes to a sparse set of edge points.
//!
//! decode -> resize -> grayscale -> optional blur -> Canny -> collect.

use image::DynamicImage;

use crate::edge;
use crate::tour::{Tour, TourStats};
use crate::types::{
    Dimensions, DrawPlan, ExtractConfig, GrayImage, PipelineError, Point, RgbaImage, StagedPlan,
};

/// The products of edge extraction.
#[derive(Debug, Clone)]
pub struct EdgeExtraction {
    /// The source image after resizing.
    pub resized: RgbaImage,
    /// Binary edge mask, same size as `resized`.
    pub edges: GrayImage,
    /// Edge pixels in raster order.
    pub points: Vec<Point>,
    /// Size of `resized` and `edges`.
    pub dimensions: Dimensions,
}

impl EdgeExtraction {
    /// Combine with a tour over [`points`](Self::points) into a
    /// [`StagedPlan`].
    #[must_use]
    pub fn into_plan(self, tour: Tour, tour_stats: TourStats) -> StagedPlan {
        StagedPlan {
            resized: self.resized,
            edges: self.edges,
            plan: DrawPlan {
                points: self.points,
                tour,
                dimensions: self.dimensions,
            },
            tour_stats,
        }
    }
}

/// Decode `bytes` and extract edge points.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`]
/// or [`PipelineError::EmptyImage`] for unusable input, and
/// [`PipelineError::InvalidSize`] for a zero target size.
pub fn extract_edges(bytes: &[u8], config: &ExtractConfig) -> Result<EdgeExtraction, PipelineError> {
    validate(config)?;
    let image = crate::grayscale::decode(bytes)?;
    extract_edges_from_image(&image, config)
}

/// Extract edge points from an already decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if `image` has a zero dimension
/// and [`PipelineError::InvalidSize`] for a zero target size.
pub fn extract_edges_from_image(
    image: &DynamicImage,
    config: &ExtractConfig,
) -> Result<EdgeExtraction, PipelineError> {
    validate(config)?;
    crate::grayscale::ensure_not_empty(image)?;

    let resized = crate::resize::resize_to_fit(image, config.target_size, config.resize_filter)?;
    let edges = detect(&resized, config);
    let points = edge::edge_points(&edges, config.exclude_border);
    let dimensions = Dimensions {
        width: resized.width(),
        height: resized.height(),
    };

    log::debug!(
        "extracted {} edge points from {}x{} (resized to {}x{})",
        points.len(),
        image.width(),
        image.height(),
        dimensions.width,
        dimensions.height,
    );

    Ok(EdgeExtraction {
        resized: resized.to_rgba8(),
        edges,
        points,
        dimensions,
    })
}

/// Grayscale, blur, and Canny.
pub(crate) fn detect(resized: &DynamicImage, config: &ExtractConfig) -> GrayImage {
    let gray = crate::grayscale::to_gray(resized);
    let blurred = edge::blur(&gray, config.blur_sigma);
    edge::canny(&blurred, config.canny_low, config.canny_high)
}

pub(crate) fn validate(config: &ExtractConfig) -> Result<(), PipelineError> {
    if config.target_size == 0 {
        return Err(PipelineError::InvalidSize(
            "target size must be greater than zero".to_owned(),
        ));
    }
    if !config.blur_sigma.is_finite() || config.blur_sigma < 0.0 {
        return Err(PipelineError::InvalidSize(format!(
            "blur sigma must be finite and non-negative, got {}",
            config.blur_sigma
        )));
    }
    Ok(())
}
