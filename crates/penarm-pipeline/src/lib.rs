//! penarm-pipeline: image to ordered drawing plan (sans-IO).
//!
//! Converts raster images into a [`DrawPlan`] through:
//! decode -> resize -> grayscale -> Canny -> edge points -> greedy tour
//! -> 2-opt refinement.
//!
//! The plan is then segmented lazily into pen-down draws and pen-up jumps
//! ([`StrokePlan`]) by whoever consumes it.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and returns structured data. Motion sinks and program
//! files live in `penarm-playback` and `penarm-export`.

pub mod diagnostics;
pub mod distance;
pub mod edge;
pub mod extract;
pub mod grayscale;
pub mod refine;
pub mod resize;
pub mod stroke;
pub mod tour;
pub mod types;

pub use extract::{EdgeExtraction, extract_edges, extract_edges_from_image};
pub use resize::ResizeFilter;
pub use stroke::{DEFAULT_DRAW_THRESHOLD, Segment, SegmentKind, Segments, StrokePlan, classify};
pub use tour::{CandidateStrategy, Tour, TourStats, build_tour, build_tour_with_stats};
pub use types::{
    Dimensions, DrawPlan, ExtractConfig, PipelineConfig, PipelineError, Point, StagedPlan,
    TourConfig,
};

/// Run the full pipeline and return the drawing plan.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::EmptyImage`] if the image has no pixels.
/// Returns [`PipelineError::InvalidSize`] for a zero target size.
/// Returns [`PipelineError::InvalidInput`] if the tour cannot be built.
pub fn plan(image_bytes: &[u8], config: &PipelineConfig) -> Result<DrawPlan, PipelineError> {
    plan_staged(image_bytes, config).map(|staged| staged.plan)
}

/// Like [`plan`], but also returns the resized image, the edge mask and
/// tour statistics.
///
/// # Errors
///
/// Same as [`plan`].
pub fn plan_staged(image_bytes: &[u8], config: &PipelineConfig) -> Result<StagedPlan, PipelineError> {
    let extraction = extract_edges(image_bytes, &config.extract)?;
    let (tour, stats) = build_tour_with_stats(&extraction.points, &config.tour)?;
    Ok(extraction.into_plan(tour, stats))
}
