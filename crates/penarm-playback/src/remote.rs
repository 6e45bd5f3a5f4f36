//! TCP client for a simulator bridge.
//!
//! The bridge runs inside (or next to) the simulator and exposes the
//! scene over a plain TCP socket. Messages are newline-delimited JSON,
//! one request and one reply at a time:
//!
//! ```text
//! -> {"op":"resolve","name":"IRB140_target"}
//! <- {"status":"ok","handle":17}
//! -> {"op":"set_position","object":17,"relative_to":4,"position":[0.0,0.0,0.3065]}
//! <- {"status":"ok"}
//! -> {"op":"resolve","name":"Nope"}
//! <- {"status":"error","message":"no object named Nope"}
//! ```
//!
//! Every request blocks until its reply line arrives (or the read
//! timeout expires).
//!
//! Replies carry no request id, so after a timeout, a failed write or a
//! malformed reply there is no telling which request the next line
//! answers. The first such failure marks the connection broken and every
//! later request fails with [`SinkError::Connection`] without touching
//! the socket.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sink::{MotionSink, ObjectHandle, Position, SinkError};

/// A request line.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Resolve {
        name: String,
    },
    SetPosition {
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    },
}

/// A reply line.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handle: Option<ObjectHandle>,
    },
    Error {
        message: String,
    },
}

/// [`MotionSink`] backed by a TCP connection to a simulator bridge.
#[derive(Debug)]
pub struct RemoteSink {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    line: String,
    /// Why the connection stopped being usable.
    broken: Option<String>,
}

impl RemoteSink {
    /// Connect to the bridge at `addr`.
    ///
    /// `timeout` bounds the connection attempt and every later read and
    /// write. Each resolved address is tried in turn.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Connection`] if no address accepts the
    /// connection.
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, SinkError> {
        let mut last_error = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    log::info!("connected to simulator bridge at {candidate}");
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Self::from_stream(stream);
                }
                Err(err) => {
                    log::debug!("connection to {candidate} failed: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(SinkError::Connection(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        })))
    }

    /// Use an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Connection`] if the stream cannot be cloned
    /// or configured.
    pub fn from_stream(stream: TcpStream) -> Result<Self, SinkError> {
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            line: String::new(),
            broken: None,
        })
    }

    /// Returns `true` once a failed exchange has left the stream out of
    /// step with its requests.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    fn exchange(&mut self, request: &Request) -> Result<Reply, SinkError> {
        if let Some(reason) = &self.broken {
            return Err(SinkError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("connection unusable after earlier failure: {reason}"),
            )));
        }
        let mut message = serde_json::to_vec(request)
            .map_err(|e| SinkError::Protocol(format!("cannot encode request: {e}")))?;
        message.push(b'\n');

        let reply = self.round_trip(&message);
        if let Err(err) = &reply {
            log::warn!("dropping simulator bridge connection: {err}");
            self.broken = Some(err.to_string());
        }
        reply
    }

    fn round_trip(&mut self, message: &[u8]) -> Result<Reply, SinkError> {
        self.writer.write_all(message)?;
        self.writer.flush()?;

        self.line.clear();
        let read = self.reader.read_line(&mut self.line)?;
        if read == 0 {
            return Err(SinkError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "bridge closed the connection",
            )));
        }
        serde_json::from_str(self.line.trim_end())
            .map_err(|e| SinkError::Protocol(format!("invalid reply {:?}: {e}", self.line.trim_end())))
    }
}

impl MotionSink for RemoteSink {
    fn resolve_object(&mut self, name: &str) -> Result<ObjectHandle, SinkError> {
        let request = Request::Resolve {
            name: name.to_owned(),
        };
        match self.exchange(&request)? {
            Reply::Ok {
                handle: Some(handle),
            } => Ok(handle),
            Reply::Ok { handle: None } => Err(SinkError::Protocol(format!(
                "resolve reply for {name:?} has no handle"
            ))),
            Reply::Error { message } => {
                log::debug!("bridge could not resolve {name:?}: {message}");
                Err(SinkError::Lookup(name.to_owned()))
            }
        }
    }

    fn set_position(
        &mut self,
        object: ObjectHandle,
        relative_to: ObjectHandle,
        position: Position,
    ) -> Result<(), SinkError> {
        let request = Request::SetPosition {
            object,
            relative_to,
            position,
        };
        match self.exchange(&request)? {
            Reply::Ok { .. } => Ok(()),
            Reply::Error { message } => Err(SinkError::Rejected(message)),
        }
    }
}
