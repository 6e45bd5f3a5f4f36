//! ABB RAPID program export.
//!
//! Serializes an ordered path into a `.prg` module that replays it on an
//! ABB controller. Every consecutive pair of path points becomes two
//! entries in three parallel `num` arrays (`array_draw_x`, `_y`, `_z`),
//! and `PROC main()` walks the arrays with `MoveL Offs(...)` relative to
//! a calibrated reference target.
//!
//! ## Coordinates
//!
//! Path coordinates are divided by
//! [`coordinate_divisor`](RapidConfig::coordinate_divisor) and used as
//! millimetre offsets from the reference target. A pair whose divided
//! distance is at most [`draw_threshold`](RapidConfig::draw_threshold)
//! is drawn at [`draw_z`](RapidConfig::draw_z) (pen pressed into the
//! surface); any other pair travels at [`lift_z`](RapidConfig::lift_z).
//!
//! Numbers are written with at least one decimal place (`5.0`, `2.5`)
//! so integral and fractional offsets read the same way in the program.
//!
//! [`to_rapid`] is a pure function with no I/O. [`write_rapid_program`]
//! is the only function in this crate that touches the filesystem.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use penarm_pipeline::{DrawPlan, Point, SegmentKind, classify};
use serde::{Deserialize, Serialize};

use crate::ExportError;

/// Settings for the generated RAPID module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidConfig {
    /// Module name; also the output file stem.
    pub module_name: String,

    /// Name of the `robtarget` constant that all offsets are relative to.
    pub reference_point: String,

    /// Value of the reference `robtarget`, in RAPID syntax.
    ///
    /// Must be re-measured whenever the drawing surface moves.
    pub reference_target: String,

    /// Name of the `tooldata` used for every move.
    pub tool_name: String,

    /// Value of the `tooldata`, in RAPID syntax.
    pub tool_data: String,

    /// Speed of the drawing moves (`v<velocity>`).
    ///
    /// Start low on a real controller.
    pub velocity: u32,

    /// Largest divided distance that is drawn rather than travelled.
    pub draw_threshold: f64,

    /// Divisor applied to path coordinates before they are written.
    pub coordinate_divisor: f64,

    /// Offset along the tool axis while drawing (mm).
    pub draw_z: i32,

    /// Offset along the tool axis while travelling (mm).
    pub lift_z: i32,
}

impl RapidConfig {
    /// Default for [`module_name`](Self::module_name).
    pub const DEFAULT_MODULE_NAME: &'static str = "example";
    /// Default for [`reference_point`](Self::reference_point).
    pub const DEFAULT_REFERENCE_POINT: &'static str = "P1";
    /// Calibration of the reference IRB 140 cell.
    pub const DEFAULT_REFERENCE_TARGET: &'static str = "[[639.4,-119.9,378.9],[0.13334, -0.23621, 0.96143, -0.04554],[0,-1,0,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]";
    /// Default for [`tool_name`](Self::tool_name).
    pub const DEFAULT_TOOL_NAME: &'static str = "Bic";
    /// Pen holder of the reference IRB 140 cell.
    pub const DEFAULT_TOOL_DATA: &'static str =
        "[TRUE,[[0.500839,-0.574904,226.276],[1,0,0,0]],[0.25,[85,0,65],[1,0,0,0],0.01,0.01,0.01]]";
    /// Default for [`velocity`](Self::velocity).
    pub const DEFAULT_VELOCITY: u32 = 100;
    /// Default for [`draw_threshold`](Self::draw_threshold).
    pub const DEFAULT_DRAW_THRESHOLD: f64 = 1.0;
    /// Default for [`coordinate_divisor`](Self::coordinate_divisor).
    pub const DEFAULT_COORDINATE_DIVISOR: f64 = 2.0;
    /// Default for [`draw_z`](Self::draw_z).
    pub const DEFAULT_DRAW_Z: i32 = -15;
    /// Default for [`lift_z`](Self::lift_z).
    pub const DEFAULT_LIFT_Z: i32 = 10;
}

impl Default for RapidConfig {
    fn default() -> Self {
        Self {
            module_name: Self::DEFAULT_MODULE_NAME.to_owned(),
            reference_point: Self::DEFAULT_REFERENCE_POINT.to_owned(),
            reference_target: Self::DEFAULT_REFERENCE_TARGET.to_owned(),
            tool_name: Self::DEFAULT_TOOL_NAME.to_owned(),
            tool_data: Self::DEFAULT_TOOL_DATA.to_owned(),
            velocity: Self::DEFAULT_VELOCITY,
            draw_threshold: Self::DEFAULT_DRAW_THRESHOLD,
            coordinate_divisor: Self::DEFAULT_COORDINATE_DIVISOR,
            draw_z: Self::DEFAULT_DRAW_Z,
            lift_z: Self::DEFAULT_LIFT_Z,
        }
    }
}

/// Parallel offset arrays for the drawing loop.
#[derive(Debug, Clone, Default, PartialEq)]
struct OffsetArrays {
    x: Vec<String>,
    y: Vec<String>,
    z: Vec<String>,
}

impl OffsetArrays {
    fn push(&mut self, point: Point, z: i32) {
        self.x.push(format_num(point.x));
        self.y.push(format_num(point.y));
        self.z.push(z.to_string());
    }
}

/// Format a coordinate with at least one decimal place.
fn format_num(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn validate(path: &[Point], config: &RapidConfig) -> Result<(), ExportError> {
    if path.len() < 2 {
        return Err(ExportError::EmptyPath);
    }
    if config.module_name.trim().is_empty() {
        return Err(ExportError::InvalidConfig(
            "module name must not be empty".to_owned(),
        ));
    }
    if !config.coordinate_divisor.is_finite() || config.coordinate_divisor <= 0.0 {
        return Err(ExportError::InvalidConfig(format!(
            "coordinate divisor must be finite and positive, got {}",
            config.coordinate_divisor
        )));
    }
    Ok(())
}

fn offsets(path: &[Point], config: &RapidConfig) -> OffsetArrays {
    let factor = config.coordinate_divisor.recip();
    let mut arrays = OffsetArrays::default();
    for pair in path.windows(2) {
        let from = pair[0].scaled(factor);
        let to = pair[1].scaled(factor);
        let z = match classify(from, to, config.draw_threshold) {
            SegmentKind::Draw => config.draw_z,
            SegmentKind::Jump => config.lift_z,
        };
        arrays.push(from, z);
        arrays.push(to, z);
    }
    arrays
}

/// Serialize `path` (points in visiting order) into a RAPID module.
///
/// # Errors
///
/// Returns [`ExportError::EmptyPath`] if `path` has fewer than two
/// points and [`ExportError::InvalidConfig`] for an empty module name or
/// a non-positive coordinate divisor.
///
/// # Examples
///
/// ```
/// use penarm_export::rapid::{RapidConfig, to_rapid};
/// use penarm_pipeline::Point;
///
/// let path = [Point::new(0.0, 0.0), Point::new(2.0, 0.0)];
/// let program = to_rapid(&path, &RapidConfig::default()).unwrap();
/// assert!(program.contains("VAR num array_draw_x{2}:= [0.0, 1.0];"));
/// assert!(program.contains("VAR num array_draw_z{2}:= [-15, -15];"));
/// ```
pub fn to_rapid(path: &[Point], config: &RapidConfig) -> Result<String, ExportError> {
    validate(path, config)?;
    let arrays = offsets(path, config);

    let module = &config.module_name;
    let point = &config.reference_point;
    let tool = &config.tool_name;
    let velocity = config.velocity;
    let n = arrays.x.len();

    let mut out = String::new();

    // --- Header ---
    let _ = writeln!(out, "%%%");
    let _ = writeln!(out, "  VERSION:1");
    let _ = writeln!(out, "  LANGUAGE:ENGLISH");
    let _ = writeln!(out, "%%%");
    let _ = writeln!(out);
    let _ = writeln!(out, "MODULE {module}");
    let _ = writeln!(out);

    // --- Cell calibration ---
    let _ = writeln!(out, "! UPDATE reference point");
    let _ = writeln!(out, "CONST robtarget {point}:={};", config.reference_target);
    let _ = writeln!(out, "! UPDATE tool point");
    let _ = writeln!(out, "PERS tooldata {tool}:={};", config.tool_data);

    // --- Path data ---
    for (axis, values) in [("x", &arrays.x), ("y", &arrays.y), ("z", &arrays.z)] {
        let _ = writeln!(
            out,
            "VAR num array_draw_{axis}{{{n}}}:= [{}];",
            values.join(", ")
        );
    }

    // --- Program ---
    let _ = writeln!(out, "\tPROC main()");
    let _ = writeln!(
        out,
        "\t\tMoveAbsJ [[45,0,0,0,90,0],[9E+09,9E+09,9E+09,9E+09,9E+09,9E+09]]\\NoEOffs,v100,z50,{tool};"
    );
    let _ = writeln!(out, "\t\tMoveJ Offs({point},0,0,100),v100,fine,{tool};");
    let _ = writeln!(out, "\t\tFOR i FROM 1 TO Dim(array_draw_x, 1) DO");
    let _ = writeln!(
        out,
        "\t\t\tMoveL Offs ({point},array_draw_x{{i}},array_draw_y{{i}},array_draw_z{{i}}), v{velocity},z1,{tool};"
    );
    let _ = writeln!(out, "\t\tENDFOR");
    let _ = writeln!(out, "\t\tMoveL Offs ({point},0,0,100),v{velocity},z10,{tool};");
    let _ = writeln!(out, "\t\tWaitTime 2;");
    let _ = writeln!(out, "\tENDPROC");
    let _ = writeln!(out, "ENDMODULE");

    Ok(out)
}

/// Serialize a [`DrawPlan`] in tour order.
///
/// # Errors
///
/// Same as [`to_rapid`].
pub fn plan_to_rapid(plan: &DrawPlan, config: &RapidConfig) -> Result<String, ExportError> {
    to_rapid(&plan.ordered_points(), config)
}

/// Path of the program file for `config` inside `dir`.
#[must_use]
pub fn program_path(dir: &Path, config: &RapidConfig) -> PathBuf {
    dir.join(format!("{}.prg", config.module_name))
}

/// Write the RAPID program for `path` to `<dir>/<module_name>.prg`.
///
/// An existing file is truncated and replaced. Returns the written path.
///
/// # Errors
///
/// Returns the errors of [`to_rapid`], or [`ExportError::FileWrite`] if
/// the file cannot be written.
pub fn write_rapid_program(
    dir: &Path,
    path: &[Point],
    config: &RapidConfig,
) -> Result<PathBuf, ExportError> {
    let program = to_rapid(path, config)?;
    let file = program_path(dir, config);
    std::fs::write(&file, program).map_err(|source| ExportError::FileWrite {
        path: file.clone(),
        source,
    })?;
    log::info!("wrote RAPID program {} ({} moves)", file.display(), 2 * (path.len() - 1));
    Ok(file)
}
