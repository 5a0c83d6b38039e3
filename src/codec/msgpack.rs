//! MessagePack codec using `rmp-serde`.
//!
//! Uses `to_vec_named` so structs serialize as maps with field names;
//! dynamic-language workers decode those without a schema.

use bytes::Bytes;

use crate::error::Result;
use crate::payload::Payload;
use crate::protocol::flags;

/// MessagePack codec for structured payload bodies.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Wire id carried in the request flags byte.
    pub const ID: u8 = flags::CODEC_MSGPACK;

    /// Encode a value into a body-only payload (struct-as-map format).
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Payload> {
        let body = rmp_serde::to_vec_named(value)?;
        Ok(Payload {
            context: Bytes::new(),
            body: body.into(),
            codec: Self::ID,
        })
    }

    /// Decode the payload body.
    pub fn decode<T: serde::de::DeserializeOwned>(payload: &Payload) -> Result<T> {
        Ok(rmp_serde::from_slice(&payload.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Message {
        id: u32,
        content: String,
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let msg = Message {
            id: 42,
            content: "hello".to_string(),
        };
        let p = MsgPackCodec::encode(&msg).unwrap();
        assert_eq!(p.codec, flags::CODEC_MSGPACK);
        let back: Message = MsgPackCodec::decode(&p).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_msgpack_struct_as_map() {
        let msg = Message {
            id: 1,
            content: "x".to_string(),
        };
        let p = MsgPackCodec::encode(&msg).unwrap();
        // map format carries field names on the wire
        let raw = &p.body[..];
        assert!(raw.windows(2).any(|w| w == b"id"));
    }

    #[test]
    fn test_msgpack_decode_rejects_garbage() {
        let p = Payload::from_body(&b"\xc1\xc1\xc1"[..]);
        assert!(MsgPackCodec::decode::<Message>(&p).is_err());
    }
}
