//! penarm-export: output serializers for drawing plans.
//!
//! Converts an ordered drawing into an ABB RAPID program ([`rapid`]) or
//! an SVG preview ([`svg`]). Serializers are pure and return `String`s;
//! [`write_rapid_program`] is the single helper that writes a file.

use std::path::PathBuf;

pub mod rapid;
pub mod svg;

pub use rapid::{RapidConfig, plan_to_rapid, to_rapid, write_rapid_program};
pub use svg::{SvgOptions, to_svg};

/// Errors from program export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A program needs at least one move between two points.
    #[error("path has fewer than two points")]
    EmptyPath,

    /// A configuration value is unusable.
    #[error("invalid export configuration: {0}")]
    InvalidConfig(String),

    /// Writing the program file failed.
    #[error("failed to write {}: {source}", path.display())]
    FileWrite {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
