//! Codec module - payload body serialization.
//!
//! Each codec is a marker struct with static methods and a wire id that
//! travels in the request frame's flags byte. The worker on the other side
//! uses the id to pick its own decoder.
//!
//! - [`RawCodec`] - pass-through for raw bytes
//! - [`JsonCodec`] - JSON via `serde_json`
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (struct-as-map format)
//!
//! # Example
//!
//! ```
//! use wirepool::codec::JsonCodec;
//!
//! let payload = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&payload).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;
mod msgpack;
mod raw;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;
