//! Request/response payload container.
//!
//! A [`Payload`] carries a binary context and body to the worker and back.
//! Uses `bytes::Bytes` so cloning a payload never copies the data.

use std::fmt;

use bytes::Bytes;

/// The unit transferred per request/response.
///
/// Either half may be empty, but an exec call requires at least one of them
/// to be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Payload context, might be omitted.
    pub context: Bytes,
    /// Binary body to be processed by the worker.
    pub body: Bytes,
    /// Codec id used to encode/decode the payload (see [`crate::protocol::flags`]).
    pub codec: u8,
}

impl Payload {
    /// Create a payload with only a body and the raw codec (0).
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self {
            context: Bytes::new(),
            body: body.into(),
            codec: 0,
        }
    }

    /// Create a payload with context, body, and codec.
    pub fn new(context: impl Into<Bytes>, body: impl Into<Bytes>, codec: u8) -> Self {
        Self {
            context: context.into(),
            body: body.into(),
            codec,
        }
    }

    /// True when both context and body are empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.body.is_empty()
    }

    /// Combined length of context and body.
    #[inline]
    pub fn len(&self) -> usize {
        self.context.len() + self.body.len()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}
