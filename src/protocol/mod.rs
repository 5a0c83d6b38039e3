//! Protocol module - wire format and frame type.
//!
//! This module implements the framed binary protocol spoken between the
//! host and its workers:
//! - 10-byte header prefix with version, flags, payload length, and CRC
//! - dynamic 32-bit options (a response carries exactly one: the context
//!   byte-offset within the payload)
//! - mutable, poolable [`Frame`] with typed accessors

mod frame;
mod wire_format;

pub use frame::Frame;
pub use wire_format::{flags, FIXED_PREFIX_SIZE, MAX_OPTIONS, MAX_PAYLOAD_SIZE, VERSION_1};
