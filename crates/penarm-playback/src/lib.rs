//! penarm-playback: drive a pen-holding arm through a drawing plan.
//!
//! A [`Driver`] walks the draw and jump segments of a
//! [`DrawPlan`](penarm_pipeline::DrawPlan) and sends one position per
//! waypoint to a [`MotionSink`]. Two sinks are provided:
//!
//! - [`RemoteSink`] talks to a simulator bridge over TCP.
//! - [`RecordingSink`] keeps the moves in memory (dry runs, tests).
//!
//! An optional [`ProgressCanvas`] mirrors the drawn segments into a
//! raster preview.

pub mod canvas;
pub mod driver;
pub mod remote;
pub mod sink;

pub use canvas::ProgressCanvas;
pub use driver::{AxisMap, Driver, PlaybackConfig, PlaybackError, PlaybackReport, WaypointFailure};
pub use remote::RemoteSink;
pub use sink::{MotionSink, ObjectHandle, Position, RecordedMove, RecordingSink, SinkError};
