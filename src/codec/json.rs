//! JSON codec using `serde_json`.

use bytes::Bytes;

use crate::error::Result;
use crate::payload::Payload;
use crate::protocol::flags;

/// JSON codec for structured payload bodies.
pub struct JsonCodec;

impl JsonCodec {
    /// Wire id carried in the request flags byte.
    pub const ID: u8 = flags::CODEC_JSON;

    /// Encode a value into a body-only payload.
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Payload> {
        let body = serde_json::to_vec(value)?;
        Ok(Payload {
            context: Bytes::new(),
            body: body.into(),
            codec: Self::ID,
        })
    }

    /// Decode the payload body.
    pub fn decode<T: serde::de::DeserializeOwned>(payload: &Payload) -> Result<T> {
        Ok(serde_json::from_slice(&payload.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Job {
        id: u32,
        task: String,
    }

    #[test]
    fn test_json_roundtrip() {
        let job = Job {
            id: 7,
            task: "resize".to_string(),
        };
        let p = JsonCodec::encode(&job).unwrap();
        assert_eq!(p.codec, flags::CODEC_JSON);
        let back: Job = JsonCodec::decode(&p).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_json_decode_rejects_garbage() {
        let p = Payload::from_body(&b"not json"[..]);
        assert!(JsonCodec::decode::<Job>(&p).is_err());
    }
}
