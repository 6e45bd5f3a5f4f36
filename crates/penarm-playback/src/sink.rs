//! Motion sinks: where playback sends end-effector positions.
//!
//! A [`MotionSink`] resolves named scene objects to handles and moves
//! one object to a position expressed relative to another. The
//! simulator client ([`RemoteSink`](crate::remote::RemoteSink)) speaks
//! to a running scene over TCP; [`RecordingSink`] keeps everything in
//! memory for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a scene object, issued by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub i64);

/// A position `[x, y, z]` in simulator units.
pub type Position = [f64; 3];

/// Errors reported by a motion sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The transport to the sink failed.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The sink does not know an object by this name.
    #[error("unknown object: {0}")]
    Lookup(String),

    /// The sink replied with something that is not a valid message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The sink understood the command but refused it.
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// Receiver of positioning commands.
///
/// Calls are blocking: each returns once the sink has acknowledged the
/// command.
pub trait MotionSink {
    /// Look up a scene object by name.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Lookup`] if no object has this name, or a
    /// transport error.
    fn resolve_object(&mut self, name: &str) -> Result<ObjectHandle, SinkError>;

    /// Move `object` to `position`, expressed in the frame of
    /// `relative_to`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Rejected`] if the sink refuses the move, or
    /// a transport error.
    fn set_position(
        &mut self,
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    ) -> Result<(), SinkError>;
}

impl<S: MotionSink + ?Sized> MotionSink for &mut S {
    fn resolve_object(&mut self, name: &str) -> Result<ObjectHandle, SinkError> {
        (**self).resolve_object(name)
    }

    fn set_position(
        &mut self,
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    ) -> Result<(), SinkError> {
        (**self).set_position(object, relative_to, position)
    }
}

impl<S: MotionSink + ?Sized> MotionSink for Box<S> {
    fn resolve_object(&mut self, name: &str) -> Result<ObjectHandle, SinkError> {
        (**self).resolve_object(name)
    }

    fn set_position(
        &mut self,
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    ) -> Result<(), SinkError> {
        (**self).set_position(object, relative_to, position)
    }
}

/// A move received by a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedMove {
    pub object: ObjectHandle,
    pub relative_to: ObjectHandle,
    pub position: Position,
}

/// In-memory [`MotionSink`] that records every accepted move.
///
/// Knows a fixed set of object names. Individual moves can be scripted
/// to fail, which exercises the playback driver's error reporting.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    objects: BTreeMap<String, ObjectHandle>,
    moves: Vec<RecordedMove>,
    failing: BTreeSet<usize>,
    attempts: usize,
}

impl RecordingSink {
    /// A sink that knows the objects of the reference IRB 140 scene.
    #[must_use]
    pub fn new() -> Self {
        Self::with_objects([
            crate::PlaybackConfig::DEFAULT_TARGET_OBJECT,
            crate::PlaybackConfig::DEFAULT_REFERENCE_FRAME,
        ])
    }

    /// A sink that knows exactly `names`, with handles assigned in order
    /// starting at 1.
    #[must_use]
    pub fn with_objects<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let objects = names
            .into_iter()
            .zip(1..)
            .map(|(name, id)| (name.into(), ObjectHandle(id)))
            .collect();
        Self {
            objects,
            ..Self::default()
        }
    }

    /// Make the `attempt`-th call to `set_position` (0-based) fail with
    /// [`SinkError::Rejected`].
    #[must_use]
    pub fn fail_move(mut self, attempt: usize) -> Self {
        self.failing.insert(attempt);
        self
    }

    /// Moves accepted so far, in order.
    #[must_use]
    pub fn moves(&self) -> &[RecordedMove] {
        &self.moves
    }

    /// Positions of the accepted moves, in order.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.moves.iter().map(|m| m.position).collect()
    }

    /// Number of `set_position` calls, including failed ones.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }
}

impl MotionSink for RecordingSink {
    fn resolve_object(&mut self, name: &str) -> Result<ObjectHandle, SinkError> {
        self.objects
            .get(name)
            .copied()
            .ok_or_else(|| SinkError::Lookup(name.to_owned()))
    }

    fn set_position(
        &mut self,
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    ) -> Result<(), SinkError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.failing.contains(&attempt) {
            return Err(SinkError::Rejected(format!("scripted failure on move {attempt}")));
        }
        self.moves.push(RecordedMove {
            object,
            relative_to,
            position,
        });
        Ok(())
    }
}
