//! Error types for wirepool.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::state::State;

/// Main error type for all wirepool operations.
///
/// The variants correspond to the error kinds a pool or supervisor needs to
/// discriminate on: `SoftJob` is the only kind that leaves the worker
/// serviceable; `Network` and `Decode` condemn the relay; `ExecTTL` and
/// `Spawn` imply the child was killed.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload had zero-length context and body.
    #[error("payload can not be empty")]
    EmptyPayload,

    /// Worker was not in the `Ready` state at exec entry.
    #[error("worker is not ready ({0})")]
    NotReady(State),

    /// Relay I/O failure, short read, or CRC mismatch.
    #[error("relay failure: {0}")]
    Network(#[source] std::io::Error),

    /// Malformed frame options or fields.
    #[error("decode error: {0}")]
    Decode(String),

    /// The worker handled the request but signalled an application error
    /// via the `ERROR` frame flag. The message is the response payload,
    /// verbatim.
    #[error("soft worker error: {0}")]
    SoftJob(String),

    /// Deadline fired during `exec_with_ttl`; the worker was killed.
    /// A kill failure is carried alongside the deadline, not instead of it.
    #[error("exec ttl reached after {ttl:?}: context deadline exceeded{}", kill_suffix(.kill))]
    ExecTTL {
        ttl: Duration,
        kill: Option<Box<Error>>,
    },

    /// Child failed the handshake, crashed during boot, or did not connect
    /// in time. The child is killed before this surfaces.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// The child exited with an unsuccessful status.
    #[error("worker exited: {0}")]
    ChildExit(ExitStatus),

    /// OS-level I/O error outside the relay (spawn, pipe setup).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON control-plane encode/decode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encode error.
    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decode error.
    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

fn kill_suffix(kill: &Option<Box<Error>>) -> String {
    match kill {
        Some(err) => format!("; kill failed: {err}"),
        None => String::new(),
    }
}

impl Error {
    /// Build a `Network` error from a plain message (CRC mismatch,
    /// truncated frame) rather than an underlying I/O error.
    pub(crate) fn network(msg: impl Into<String>) -> Self {
        Error::Network(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            msg.into(),
        ))
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
