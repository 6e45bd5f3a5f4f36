//! Playback driver: replay a drawing plan against a motion sink.
//!
//! For each tour segment the pen is moved to the segment's start and
//! end point, at drawing height for draw segments and slightly above it
//! for jumps:
//!
//! ```text
//! home ─▶ seg 0 start ─▶ seg 0 end ─▶ seg 1 start ─▶ ... ─▶ home
//! ```
//!
//! Object lookup happens once before anything moves, and an unknown
//! object is fatal. After that, a failed move is logged and recorded in
//! the [`PlaybackReport`] and replay carries on with the next waypoint.
//! The pen is always sent home at the end, including when the replay
//! is stopped early or unwinds.

use std::ops::ControlFlow;
use std::time::Duration;

use penarm_pipeline::{DEFAULT_DRAW_THRESHOLD, DrawPlan, Point, Segment, SegmentKind};
use serde::{Deserialize, Serialize};

use crate::canvas::ProgressCanvas;
use crate::sink::{MotionSink, ObjectHandle, Position, SinkError};

/// Serde support for `Duration` as whole milliseconds.
mod millis_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// How image axes map onto the drawing plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisMap {
    /// Image row along the plane's x axis, column along y.
    #[default]
    Swapped,
    /// Image column along x, row along y.
    Direct,
}

/// Playback parameters.
///
/// Lengths are in simulator units (metres in the reference scene) except
/// [`draw_threshold`](Self::draw_threshold), which is in resized-image
/// pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Multiplier applied to image coordinates.
    pub scale: f64,
    /// Height of the drawing surface in the reference frame.
    pub draw_height: f64,
    /// Lift above the surface for jumps.
    pub jump_clearance: f64,
    /// Lift above the surface for the home position.
    pub home_clearance: f64,
    /// Image pixels per simulator unit, before scaling.
    pub unit_divisor: f64,
    pub axis_map: AxisMap,
    /// Longest segment drawn with the pen down.
    pub draw_threshold: f64,
    /// Name of the end-effector target object.
    pub target_object: String,
    /// Name of the object whose frame positions are expressed in.
    pub reference_frame: String,
    /// Pause after draw moves and the first move of a jump.
    #[serde(with = "millis_serde")]
    pub settle_delay: Duration,
    /// Pause after the last move of a jump.
    #[serde(with = "millis_serde")]
    pub jump_settle_delay: Duration,
}

impl PlaybackConfig {
    /// Default for [`scale`](Self::scale).
    pub const DEFAULT_SCALE: f64 = 1.0;
    /// Height of the drawing plane in the reference scene.
    pub const DEFAULT_DRAW_HEIGHT: f64 = 0.1065;
    /// Default for [`jump_clearance`](Self::jump_clearance).
    pub const DEFAULT_JUMP_CLEARANCE: f64 = 0.001;
    /// Default for [`home_clearance`](Self::home_clearance).
    pub const DEFAULT_HOME_CLEARANCE: f64 = 0.2;
    /// Default for [`unit_divisor`](Self::unit_divisor).
    pub const DEFAULT_UNIT_DIVISOR: f64 = 1000.0;
    /// Default for [`target_object`](Self::target_object).
    pub const DEFAULT_TARGET_OBJECT: &'static str = "IRB140_target";
    /// Default for [`reference_frame`](Self::reference_frame).
    pub const DEFAULT_REFERENCE_FRAME: &'static str = "Dummy";
    /// Default for [`settle_delay`](Self::settle_delay).
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);
    /// Default for [`jump_settle_delay`](Self::jump_settle_delay).
    pub const DEFAULT_JUMP_SETTLE_DELAY: Duration = Duration::from_millis(50);

    /// Check that every numeric parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidScale`] for a non-finite or
    /// non-positive scale, and [`PlaybackError::InvalidConfig`] for any
    /// other unusable value.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PlaybackError::InvalidScale(self.scale));
        }
        if !self.unit_divisor.is_finite() || self.unit_divisor <= 0.0 {
            return Err(PlaybackError::InvalidConfig(format!(
                "unit divisor must be finite and positive, got {}",
                self.unit_divisor
            )));
        }
        for (name, value) in [
            ("draw height", self.draw_height),
            ("jump clearance", self.jump_clearance),
            ("home clearance", self.home_clearance),
            ("draw threshold", self.draw_threshold),
        ] {
            if !value.is_finite() {
                return Err(PlaybackError::InvalidConfig(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.draw_threshold < 0.0 {
            return Err(PlaybackError::InvalidConfig(format!(
                "draw threshold must not be negative, got {}",
                self.draw_threshold
            )));
        }
        Ok(())
    }

    /// The position the pen starts from and returns to.
    #[must_use]
    pub fn home(&self) -> Position {
        [0.0, 0.0, self.draw_height + self.home_clearance]
    }

    /// Height used for jump moves.
    #[must_use]
    pub fn jump_height(&self) -> f64 {
        self.draw_height + self.jump_clearance
    }

    /// Map an image point to a position at height `z`.
    #[must_use]
    pub fn to_device(&self, point: Point, z: f64) -> Position {
        let factor = self.scale / self.unit_divisor;
        match self.axis_map {
            AxisMap::Swapped => [point.y * factor, point.x * factor, z],
            AxisMap::Direct => [point.x * factor, point.y * factor, z],
        }
    }

    /// Configuration without settle delays, for sinks that need no time
    /// to reach a waypoint.
    #[must_use]
    pub fn without_delays(self) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            jump_settle_delay: Duration::ZERO,
            ..self
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            draw_height: Self::DEFAULT_DRAW_HEIGHT,
            jump_clearance: Self::DEFAULT_JUMP_CLEARANCE,
            home_clearance: Self::DEFAULT_HOME_CLEARANCE,
            unit_divisor: Self::DEFAULT_UNIT_DIVISOR,
            axis_map: AxisMap::default(),
            draw_threshold: DEFAULT_DRAW_THRESHOLD,
            target_object: Self::DEFAULT_TARGET_OBJECT.to_owned(),
            reference_frame: Self::DEFAULT_REFERENCE_FRAME.to_owned(),
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
            jump_settle_delay: Self::DEFAULT_JUMP_SETTLE_DELAY,
        }
    }
}

/// Errors that stop a replay before it starts.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The scale factor is not a finite positive number.
    #[error("scale must be finite and positive, got {0}")]
    InvalidScale(f64),

    /// Another configuration value is unusable.
    #[error("invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// A scene object could not be resolved.
    #[error("cannot resolve scene object {name:?}")]
    Lookup {
        name: String,
        #[source]
        source: SinkError,
    },
}

/// A move the sink did not complete.
#[derive(Debug)]
pub struct WaypointFailure {
    /// 0-based index of the move within the replay, counting the
    /// initial home move as 0.
    pub waypoint: usize,
    /// Segment the move belonged to; `None` for home moves.
    pub segment: Option<usize>,
    pub error: SinkError,
}

/// Outcome of a replay.
#[derive(Debug, Default)]
pub struct PlaybackReport {
    /// Segments replayed.
    pub segments: usize,
    pub draws: usize,
    pub jumps: usize,
    /// Moves attempted, including the home moves.
    pub waypoints: usize,
    /// Moves the sink failed, in order.
    pub failures: Vec<WaypointFailure>,
    /// Whether the callback stopped the replay before the last segment.
    pub stopped_early: bool,
}

impl PlaybackReport {
    /// Returns `true` if every move succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replays [`DrawPlan`]s against a [`MotionSink`].
#[derive(Debug)]
pub struct Driver<S> {
    sink: S,
    config: PlaybackConfig,
    canvas: Option<ProgressCanvas>,
}

impl<S: MotionSink> Driver<S> {
    /// Create a driver.
    ///
    /// # Errors
    ///
    /// Returns the error of [`PlaybackConfig::validate`].
    pub fn new(sink: S, config: PlaybackConfig) -> Result<Self, PlaybackError> {
        config.validate()?;
        Ok(Self {
            sink,
            config,
            canvas: None,
        })
    }

    /// Stroke draw segments onto `canvas` while replaying.
    #[must_use]
    pub fn with_canvas(mut self, canvas: ProgressCanvas) -> Self {
        self.canvas = Some(canvas);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub const fn canvas(&self) -> Option<&ProgressCanvas> {
        self.canvas.as_ref()
    }

    /// Take the canvas out of the driver.
    pub const fn take_canvas(&mut self) -> Option<ProgressCanvas> {
        self.canvas.take()
    }

    /// Consume the driver and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Replay every segment of `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Lookup`] if the target or reference
    /// object cannot be resolved. Nothing has moved in that case.
    pub fn replay(&mut self, plan: &DrawPlan) -> Result<PlaybackReport, PlaybackError> {
        self.replay_until(plan, |_| ControlFlow::Continue(()))
    }

    /// Replay `plan`, asking `control` before each segment whether to
    /// continue.
    ///
    /// Returning [`ControlFlow::Break`] skips the remaining segments;
    /// the pen still returns home.
    ///
    /// # Errors
    ///
    /// Same as [`replay`](Self::replay).
    pub fn replay_until<F>(
        &mut self,
        plan: &DrawPlan,
        mut control: F,
    ) -> Result<PlaybackReport, PlaybackError>
    where
        F: FnMut(&Segment) -> ControlFlow<()>,
    {
        let Self {
            sink,
            config,
            canvas,
        } = self;

        let target = resolve(sink, &config.target_object)?;
        let frame = resolve(sink, &config.reference_frame)?;
        let strokes = plan.strokes(config.draw_threshold);
        log::info!(
            "replaying {} segments ({} points) at scale {}",
            strokes.len(),
            plan.points.len(),
            config.scale,
        );

        let mut session = Homing::new(Session {
            sink,
            config,
            canvas: canvas.as_mut(),
            target,
            frame,
            report: PlaybackReport::default(),
        });
        session.go_home();

        for segment in &strokes {
            if control(&segment).is_break() {
                log::info!("replay stopped before segment {}", segment.index);
                session.report.stopped_early = true;
                break;
            }
            session.play(&segment);
        }

        let report = session.finish();
        log::info!(
            "replay finished: {} draws, {} jumps, {} failed moves",
            report.draws,
            report.jumps,
            report.failures.len(),
        );
        Ok(report)
    }
}

fn resolve<S: MotionSink>(sink: &mut S, name: &str) -> Result<ObjectHandle, PlaybackError> {
    sink.resolve_object(name)
        .map_err(|source| PlaybackError::Lookup {
            name: name.to_owned(),
            source,
        })
}

/// State of one replay.
struct Session<'a, S> {
    sink: &'a mut S,
    config: &'a PlaybackConfig,
    canvas: Option<&'a mut ProgressCanvas>,
    target: ObjectHandle,
    frame: ObjectHandle,
    report: PlaybackReport,
}

impl<S: MotionSink> Session<'_, S> {
    fn move_to(&mut self, position: Position, segment: Option<usize>) {
        let waypoint = self.report.waypoints;
        self.report.waypoints += 1;
        if let Err(error) = self.sink.set_position(self.target, self.frame, position) {
            match segment {
                Some(index) => log::warn!("move {waypoint} (segment {index}) failed: {error}"),
                None => log::warn!("home move {waypoint} failed: {error}"),
            }
            self.report.failures.push(WaypointFailure {
                waypoint,
                segment,
                error,
            });
        }
    }

    fn go_home(&mut self) {
        self.move_to(self.config.home(), None);
    }

    fn play(&mut self, segment: &Segment) {
        let index = Some(segment.index);
        let settle = self.config.settle_delay;
        match segment.kind {
            SegmentKind::Draw => {
                let z = self.config.draw_height;
                self.move_to(self.config.to_device(segment.from, z), index);
                settle_for(settle);
                if let Some(canvas) = self.canvas.as_deref_mut() {
                    canvas.draw_segment(segment);
                }
                self.move_to(self.config.to_device(segment.to, z), index);
                settle_for(settle);
                self.report.draws += 1;
            }
            SegmentKind::Jump => {
                let z = self.config.jump_height();
                self.move_to(self.config.to_device(segment.from, z), index);
                settle_for(settle);
                self.move_to(self.config.to_device(segment.to, z), index);
                settle_for(self.config.jump_settle_delay);
                self.report.jumps += 1;
            }
        }
        self.report.segments += 1;
    }
}

fn settle_for(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Sends the pen home when dropped, unless [`finish`](Self::finish)
/// already did.
struct Homing<'a, S: MotionSink> {
    session: Session<'a, S>,
    done: bool,
}

impl<'a, S: MotionSink> Homing<'a, S> {
    const fn new(session: Session<'a, S>) -> Self {
        Self {
            session,
            done: false,
        }
    }

    fn finish(mut self) -> PlaybackReport {
        self.session.go_home();
        self.done = true;
        std::mem::take(&mut self.session.report)
    }
}

impl<'a, S: MotionSink> std::ops::Deref for Homing<'a, S> {
    type Target = Session<'a, S>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<S: MotionSink> std::ops::DerefMut for Homing<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl<S: MotionSink> Drop for Homing<'_, S> {
    fn drop(&mut self) {
        if !self.done {
            log::warn!("replay interrupted; returning home");
            self.session.go_home();
        }
    }
}
