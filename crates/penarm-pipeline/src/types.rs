//! Shared types for the penarm pipeline.

use serde::{Deserialize, Serialize};

use crate::resize::ResizeFilter;
use crate::stroke::StrokePlan;
use crate::tour::{CandidateStrategy, Tour, TourStats};

/// Re-export `GrayImage` so downstream crates can reference the edge
/// mask without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the resized
/// source image without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in resized-image coordinates.
///
/// Edge points always carry integral values: `x` is the pixel column and
/// `y` the pixel row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a point from a pixel `(column, row)` position.
    #[must_use]
    pub fn from_pixel(column: u32, row: u32) -> Self {
        Self::new(f64::from(column), f64::from(row))
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Multiply both coordinates by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Configuration for the edge extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Length in pixels the larger image dimension is resized to.
    pub target_size: u32,

    /// Resampling filter used for the resize.
    pub resize_filter: ResizeFilter,

    /// Optional Gaussian blur sigma applied before edge detection.
    /// `0.0` disables the blur.
    pub blur_sigma: f32,

    /// Canny hysteresis low threshold.
    pub canny_low: f32,

    /// Canny hysteresis high threshold.
    pub canny_high: f32,

    /// Skip edge pixels in the first row and first column.
    pub exclude_border: bool,
}

impl ExtractConfig {
    /// Default for [`target_size`](Self::target_size).
    pub const DEFAULT_TARGET_SIZE: u32 = 350;
    /// Default for [`blur_sigma`](Self::blur_sigma).
    pub const DEFAULT_BLUR_SIGMA: f32 = 0.0;
    /// Default for [`canny_low`](Self::canny_low).
    pub const DEFAULT_CANNY_LOW: f32 = 1.0;
    /// Default for [`canny_high`](Self::canny_high).
    pub const DEFAULT_CANNY_HIGH: f32 = 255.0;
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            target_size: Self::DEFAULT_TARGET_SIZE,
            resize_filter: ResizeFilter::default(),
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            exclude_border: true,
        }
    }
}

/// Configuration for the tour builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    /// How candidate edges for the greedy heuristic are generated.
    pub strategy: CandidateStrategy,

    /// Largest point count for which [`CandidateStrategy::Auto`] builds
    /// the full distance matrix.
    pub matrix_limit: usize,

    /// Neighbours queried per point by [`CandidateStrategy::Nearest`].
    pub nearest_k: usize,

    /// Maximum number of 2-opt improvement passes after construction.
    pub refine_passes: usize,
}

impl TourConfig {
    /// Default for [`matrix_limit`](Self::matrix_limit).
    pub const DEFAULT_MATRIX_LIMIT: usize = 4000;
    /// Default for [`nearest_k`](Self::nearest_k).
    pub const DEFAULT_NEAREST_K: usize = 10;
    /// Default for [`refine_passes`](Self::refine_passes).
    pub const DEFAULT_REFINE_PASSES: usize = 3;
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            strategy: CandidateStrategy::default(),
            matrix_limit: Self::DEFAULT_MATRIX_LIMIT,
            nearest_k: Self::DEFAULT_NEAREST_K,
            refine_passes: Self::DEFAULT_REFINE_PASSES,
        }
    }
}

/// Configuration for the whole image-to-plan pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Edge extraction parameters.
    pub extract: ExtractConfig,
    /// Tour construction parameters.
    pub tour: TourConfig,
}

/// The ordered drawing produced by the pipeline.
///
/// Holds the extracted points, the visiting order over them, and the
/// size of the resized image the points live in. Consumers (playback,
/// program export, previews) borrow it read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawPlan {
    /// Edge points in extraction order. The index is the point's identity.
    pub points: Vec<Point>,
    /// Visiting order over `points`.
    pub tour: Tour,
    /// Dimensions of the resized image.
    pub dimensions: Dimensions,
}

impl DrawPlan {
    /// Returns `true` if the plan visits no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tour.is_empty()
    }

    /// Points in visiting order.
    #[must_use]
    pub fn ordered_points(&self) -> Vec<Point> {
        self.tour.iter().map(|&i| self.points[i]).collect()
    }

    /// Lazy draw/jump segmentation of the tour.
    #[must_use]
    pub fn strokes(&self, threshold: f64) -> StrokePlan<'_> {
        StrokePlan::new(&self.points, &self.tour, threshold)
    }
}

/// A [`DrawPlan`] together with the raster intermediates it came from.
///
/// Returned by [`plan_staged`](crate::plan_staged) for callers that want
/// to save the resized image or edge mask alongside the plan.
#[derive(Debug, Clone)]
pub struct StagedPlan {
    /// The source image after resizing.
    pub resized: RgbaImage,
    /// Binary edge mask.
    pub edges: GrayImage,
    /// The ordered drawing.
    pub plan: DrawPlan,
    /// How the tour was built.
    pub tour_stats: TourStats,
}

/// Errors that can occur while building a [`DrawPlan`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has zero width or height.
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// A size parameter is out of range.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// The point set cannot be processed by the tour builder.
    #[error("invalid tour input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_from_pixel_maps_column_to_x() {
        let p = Point::from_pixel(3, 7);
        assert_eq!(p, Point::new(3.0, 7.0));
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance_is_symmetric() {
        let a = Point::new(12.0, -3.5);
        let b = Point::new(-7.25, 40.0);
        assert!((a.distance(b) - b.distance(a)).abs() < 1e-12);
    }

    #[test]
    fn point_scaled() {
        assert_eq!(Point::new(2.0, 3.0).scaled(1.5), Point::new(3.0, 4.5));
    }

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = PipelineConfig::default();
        assert_eq!(config.extract.target_size, 350);
        assert!((config.extract.canny_low - 1.0).abs() < f32::EPSILON);
        assert!((config.extract.canny_high - 255.0).abs() < f32::EPSILON);
        assert!(config.extract.exclude_border);
        assert_eq!(config.tour.strategy, CandidateStrategy::Auto);
        assert_eq!(config.tour.refine_passes, 3);
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"extract":{"target_size":200}}"#).unwrap();
        assert_eq!(config.extract.target_size, 200);
        assert_eq!(config.tour, TourConfig::default());
    }

    #[test]
    fn ordered_points_follow_tour() {
        let plan = DrawPlan {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(1.0, 0.0)],
            tour: Tour::new(vec![0, 2, 1]),
            dimensions: Dimensions {
                width: 6,
                height: 1,
            },
        };
        assert_eq!(
            plan.ordered_points(),
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(5.0, 0.0)],
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(PipelineError::EmptyInput.to_string(), "input image data is empty");
        assert_eq!(
            PipelineError::InvalidSize("target size must be positive".into()).to_string(),
            "invalid size: target size must be positive",
        );
    }
}
