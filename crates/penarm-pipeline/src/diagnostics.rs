//! Pipeline diagnostics: timing and counts for each stage.
//!
//! [`plan_with_diagnostics`] runs the same stages as
//! [`plan_staged`](crate::plan_staged) and records how long each took and
//! what it produced. Time comes from a [`Clock`] so tests can substitute
//! a deterministic one.
//!
//! In JSON, durations are written as milliseconds with a fractional part.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineConfig, PipelineError, StagedPlan};

/// `Duration` as fractional milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::duration_ms(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(ms / 1000.0)
            .map_err(|e| D::Error::custom(format!("invalid duration {ms}ms: {e}")))
    }
}

/// Source of monotonic time for stage measurements.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Resize to the target size.
    pub resize: StageDiagnostics,
    /// Grayscale conversion, blur and Canny.
    pub edge_detection: StageDiagnostics,
    /// Collecting edge pixels into points.
    pub point_collection: StageDiagnostics,
    /// Tour construction and refinement.
    pub tour: StageDiagnostics,
    /// Time from the start of decoding to the end of the tour.
    #[serde(rename = "total_ms", with = "millis")]
    pub total_duration: Duration,
    pub summary: PipelineSummary,
}

/// Timing and output of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    #[serde(rename = "ms", with = "millis")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// What a stage produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageMetrics {
    Decode {
        input_bytes: usize,
        width: u32,
        height: u32,
    },
    Resize {
        filter: String,
        target_size: u32,
        width: u32,
        height: u32,
    },
    EdgeDetection {
        blur_sigma: f32,
        /// Low threshold as configured (before clamping).
        low_threshold: f32,
        /// High threshold as configured (before clamping).
        high_threshold: f32,
        /// Set pixels in the edge mask.
        edge_pixel_count: u64,
        total_pixel_count: u64,
    },
    PointCollection {
        point_count: usize,
        border_excluded: bool,
    },
    Tour {
        /// Candidate strategy actually used.
        strategy: String,
        candidate_count: usize,
        fallback_edges: usize,
        refinements: usize,
        /// 2-opt moves evaluated.
        #[serde(default)]
        refine_checks: usize,
        /// Whether extraction order was kept because it was shorter.
        kept_identity: bool,
        /// Length of the tour in resized-image pixels.
        length: f64,
        /// Length of visiting points in extraction order.
        identity_length: f64,
    },
}

/// Sizes and counts of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Decoded source image size.
    pub source: Dimensions,
    /// Resized image size (the plan's coordinate space).
    pub resized: Dimensions,
    /// Number of edge points.
    pub point_count: usize,
    /// Tour length in resized-image pixels.
    pub tour_length: f64,
}

impl PipelineDiagnostics {
    /// Per-stage rows in execution order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("decode", &self.decode),
            ("resize", &self.resize),
            ("edges", &self.edge_detection),
            ("points", &self.point_collection),
            ("tour", &self.tour),
        ]
    }

    /// Plain-text table of the run, one stage per row.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write as _;

        let summary = &self.summary;
        let total = duration_ms(self.total_duration);
        let mut out = format!(
            "{}x{} image traced at {}x{}: {} points, tour {:.1}px, {total:.2} ms\n\n",
            summary.source.width,
            summary.source.height,
            summary.resized.width,
            summary.resized.height,
            summary.point_count,
            summary.tour_length,
        );
        for (name, stage) in self.stages() {
            let ms = duration_ms(stage.duration);
            let share = if total > 0.0 { 100.0 * ms / total } else { 0.0 };
            let _ = writeln!(
                out,
                "  {name:<8}{ms:>10.2} ms {share:>5.1}%   {}",
                format_metrics(&stage.metrics)
            );
        }
        out
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{width}x{height} from {input_bytes} bytes"),
        StageMetrics::Resize {
            filter,
            target_size,
            width,
            height,
        } => format!("{width}x{height} ({filter}, longest side {target_size})"),
        StageMetrics::EdgeDetection {
            blur_sigma,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let percent = match *total_pixel_count {
                0 => 0.0,
                all => 100.0 * *edge_pixel_count as f64 / all as f64,
            };
            format!(
                "{edge_pixel_count} edge pixels ({percent:.1}%), canny {low_threshold}..{high_threshold}, blur {blur_sigma}",
            )
        }
        StageMetrics::PointCollection {
            point_count,
            border_excluded,
        } => {
            let border = if *border_excluded { "excluded" } else { "included" };
            format!("{point_count} points, border {border}")
        }
        StageMetrics::Tour {
            strategy,
            candidate_count,
            fallback_edges,
            refinements,
            refine_checks,
            kept_identity,
            length,
            identity_length,
        } => {
            let mut text = format!(
                "{length:.1}px vs {identity_length:.1}px unordered; {strategy}, {candidate_count} candidates, {fallback_edges} joins, {refinements}/{refine_checks} 2-opt moves",
            );
            if *kept_identity {
                text.push_str("; kept extraction order");
            }
            text
        }
    }
}

pub(crate) fn count_edge_pixels(mask: &image::GrayImage) -> u64 {
    mask.as_raw()
        .iter()
        .filter(|&&v| v == crate::edge::EDGE)
        .count() as u64
}

/// Run the pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Same as [`plan`](crate::plan).
pub fn plan_with_diagnostics(
    bytes: &[u8],
    config: &PipelineConfig,
    clock: &impl Clock,
) -> Result<(StagedPlan, PipelineDiagnostics), PipelineError> {
    let extract = &config.extract;
    crate::extract::validate(extract)?;
    let start = clock.now();

    let image = crate::grayscale::decode(bytes)?;
    let source = Dimensions {
        width: image.width(),
        height: image.height(),
    };
    let t = clock.now();
    let decode = StageDiagnostics {
        duration: t.saturating_sub(start),
        metrics: StageMetrics::Decode {
            input_bytes: bytes.len(),
            width: source.width,
            height: source.height,
        },
    };

    let mark = t;
    let resized = crate::resize::resize_to_fit(&image, extract.target_size, extract.resize_filter)?;
    drop(image);
    let dimensions = Dimensions {
        width: resized.width(),
        height: resized.height(),
    };
    let t = clock.now();
    let resize = StageDiagnostics {
        duration: t.saturating_sub(mark),
        metrics: StageMetrics::Resize {
            filter: extract.resize_filter.to_string(),
            target_size: extract.target_size,
            width: dimensions.width,
            height: dimensions.height,
        },
    };

    let mark = t;
    let edges = crate::extract::detect(&resized, extract);
    let t = clock.now();
    let edge_detection = StageDiagnostics {
        duration: t.saturating_sub(mark),
        metrics: StageMetrics::EdgeDetection {
            blur_sigma: extract.blur_sigma,
            low_threshold: extract.canny_low,
            high_threshold: extract.canny_high,
            edge_pixel_count: count_edge_pixels(&edges),
            total_pixel_count: u64::from(dimensions.width) * u64::from(dimensions.height),
        },
    };

    let mark = t;
    let points = crate::edge::edge_points(&edges, extract.exclude_border);
    let t = clock.now();
    let point_collection = StageDiagnostics {
        duration: t.saturating_sub(mark),
        metrics: StageMetrics::PointCollection {
            point_count: points.len(),
            border_excluded: extract.exclude_border,
        },
    };

    let mark = t;
    let (tour, stats) = crate::tour::build_tour_with_stats(&points, &config.tour)?;
    let end = clock.now();
    let tour_diag = StageDiagnostics {
        duration: end.saturating_sub(mark),
        metrics: StageMetrics::Tour {
            strategy: format!("{:?}", stats.strategy),
            candidate_count: stats.candidate_count,
            fallback_edges: stats.fallback_edges,
            refinements: stats.refinements,
            refine_checks: stats.refine_checks,
            kept_identity: stats.kept_identity,
            length: stats.length,
            identity_length: stats.identity_length,
        },
    };

    let summary = PipelineSummary {
        source,
        resized: dimensions,
        point_count: points.len(),
        tour_length: stats.length,
    };
    let diagnostics = PipelineDiagnostics {
        decode,
        resize,
        edge_detection,
        point_collection,
        tour: tour_diag,
        total_duration: end.saturating_sub(start),
        summary,
    };

    let extraction = crate::extract::EdgeExtraction {
        resized: resized.to_rgba8(),
        edges,
        points,
        dimensions,
    };
    Ok((extraction.into_plan(tour, stats), diagnostics))
}
