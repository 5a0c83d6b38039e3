//! Wire format constants and header layout.
//!
//! Fixed 10-byte prefix, followed by dynamic options and payload:
//! ```text
//! ┌─────────────┬───────┬──────────┬──────────┬─────────────┬─────────┐
//! │ Ver | Opts  │ Flags │ PayldLen │ CRC-32   │ Options     │ Payload │
//! │ 4b  | 4b    │ 1 byte│ 4 bytes  │ 4 bytes  │ 4 bytes × N │ ...     │
//! └─────────────┴───────┴──────────┴──────────┴─────────────┴─────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The CRC covers the first
//! 6 prefix bytes plus the encoded options; the payload is not checksummed.

/// Fixed prefix size in bytes (exactly 10).
pub const FIXED_PREFIX_SIZE: usize = 10;

/// Byte range of the prefix covered by the CRC (version through payload length).
pub(crate) const CRC_COVERED_PREFIX: usize = 6;

/// Protocol version carried in the high nibble of byte 0.
pub const VERSION_1: u8 = 1;

/// Maximum number of 32-bit options a frame can carry (4-bit count field).
pub const MAX_OPTIONS: usize = 15;

/// Maximum accepted payload size (128 MB).
pub const MAX_PAYLOAD_SIZE: u32 = 134_217_728;

/// Flag constants for the protocol.
pub mod flags {
    /// Control frame (handshake, stop) rather than a data frame.
    pub const CONTROL: u8 = 0b0000_0001;
    /// Graceful-stop command; only meaningful together with `CONTROL`.
    pub const STOP: u8 = 0b0000_0010;
    /// Payload is raw bytes.
    pub const CODEC_RAW: u8 = 0b0000_0100;
    /// Payload is JSON.
    pub const CODEC_JSON: u8 = 0b0001_0000;
    /// Payload is MessagePack.
    pub const CODEC_MSGPACK: u8 = 0b0010_0000;
    /// Response carries an application error; payload is the message.
    pub const ERROR: u8 = 0b0100_0000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_are_disjoint() {
        let all = [
            flags::CONTROL,
            flags::STOP,
            flags::CODEC_RAW,
            flags::CODEC_JSON,
            flags::CODEC_MSGPACK,
            flags::ERROR,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "flags {a:#04x} and {b:#04x} overlap");
                }
            }
        }
    }

    #[test]
    fn test_has_flag() {
        let f = flags::CONTROL | flags::STOP;
        assert!(flags::has_flag(f, flags::CONTROL));
        assert!(flags::has_flag(f, flags::STOP));
        assert!(!flags::has_flag(f, flags::ERROR));
    }

    #[test]
    fn test_prefix_size_is_exactly_10() {
        assert_eq!(FIXED_PREFIX_SIZE, 10);
    }
}
