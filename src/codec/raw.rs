//! Raw codec - pass-through for binary data.

use bytes::Bytes;

use crate::payload::Payload;
use crate::protocol::flags;

/// Pass-through codec for payloads that are already bytes.
pub struct RawCodec;

impl RawCodec {
    /// Wire id carried in the request flags byte.
    pub const ID: u8 = flags::CODEC_RAW;

    /// Wrap raw bytes into a body-only payload.
    #[inline]
    pub fn encode(body: impl Into<Bytes>) -> Payload {
        Payload {
            context: Bytes::new(),
            body: body.into(),
            codec: Self::ID,
        }
    }

    /// The payload body, as-is.
    #[inline]
    pub fn decode(payload: &Payload) -> Bytes {
        payload.body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_passthrough() {
        let p = RawCodec::encode(&b"binary data"[..]);
        assert_eq!(p.codec, flags::CODEC_RAW);
        assert_eq!(&RawCodec::decode(&p)[..], b"binary data");
    }

    #[test]
    fn test_raw_zero_copy() {
        let body = Bytes::from_static(b"zero copy");
        let p = RawCodec::encode(body.clone());
        assert_eq!(p.body.as_ptr(), body.as_ptr());
    }
}
