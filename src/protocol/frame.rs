//! Mutable frame with typed header accessors.
//!
//! A [`Frame`] owns its header prefix, options, and payload buffer so it can
//! be pooled and reused across calls: [`Frame::reset`] clears the contents
//! while retaining payload capacity. Write accessors fill the header in
//! place; [`Frame::write_crc`] must run last, after the options are final.
//!
//! # Example
//!
//! ```
//! use wirepool::protocol::{flags, Frame, VERSION_1};
//!
//! let mut fr = Frame::new();
//! fr.write_version(VERSION_1);
//! fr.write_flags(flags::CODEC_RAW);
//! fr.write_options(5);
//! fr.write_payload_len(5);
//! fr.write_payload(b"hello");
//! fr.write_crc();
//! assert!(fr.verify_crc());
//! ```

use bytes::{BufMut, BytesMut};

use super::wire_format::{CRC_COVERED_PREFIX, FIXED_PREFIX_SIZE, MAX_OPTIONS};

/// A complete protocol frame: prefix, options, payload.
#[derive(Debug, Default)]
pub struct Frame {
    prefix: [u8; FIXED_PREFIX_SIZE],
    options: Vec<u32>,
    payload: BytesMut,
}

impl Frame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self {
            prefix: [0u8; FIXED_PREFIX_SIZE],
            options: Vec::new(),
            payload: BytesMut::new(),
        }
    }

    /// Clear the frame for reuse. Payload capacity is retained.
    pub fn reset(&mut self) {
        self.prefix = [0u8; FIXED_PREFIX_SIZE];
        self.options.clear();
        self.payload.clear();
    }

    /// Write the protocol version (low 4 bits used).
    #[inline]
    pub fn write_version(&mut self, version: u8) {
        debug_assert!(version <= 0x0F);
        self.prefix[0] = (version << 4) | (self.prefix[0] & 0x0F);
    }

    /// Read the protocol version.
    #[inline]
    pub fn version(&self) -> u8 {
        self.prefix[0] >> 4
    }

    /// Write the flags byte.
    #[inline]
    pub fn write_flags(&mut self, flags: u8) {
        self.prefix[1] = flags;
    }

    /// Read the flags byte.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.prefix[1]
    }

    /// Append one option and bump the header option count.
    pub fn write_options(&mut self, option: u32) {
        debug_assert!(self.options.len() < MAX_OPTIONS);
        self.options.push(option);
        self.prefix[0] = (self.prefix[0] & 0xF0) | (self.options.len() as u8 & 0x0F);
    }

    /// The options exactly as written or received.
    #[inline]
    pub fn options(&self) -> &[u32] {
        &self.options
    }

    /// Option count declared in the header.
    #[inline]
    pub fn options_count(&self) -> usize {
        (self.prefix[0] & 0x0F) as usize
    }

    /// Write the payload length field.
    #[inline]
    pub fn write_payload_len(&mut self, len: u32) {
        self.prefix[2..6].copy_from_slice(&len.to_be_bytes());
    }

    /// Read the payload length field.
    #[inline]
    pub fn payload_len(&self) -> u32 {
        u32::from_be_bytes([self.prefix[2], self.prefix[3], self.prefix[4], self.prefix[5]])
    }

    /// Copy `data` into the frame's payload buffer.
    pub fn write_payload(&mut self, data: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(data);
    }

    /// The payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable access to the payload buffer (receive path fills it directly).
    #[inline]
    pub(crate) fn payload_mut(&mut self) -> &mut BytesMut {
        &mut self.payload
    }

    /// Compute the header CRC and store it in the CRC slot.
    ///
    /// Must be called after all other header writes; covers the first six
    /// prefix bytes and the encoded options, never the payload.
    pub fn write_crc(&mut self) {
        let crc = self.compute_crc();
        self.prefix[6..10].copy_from_slice(&crc.to_be_bytes());
    }

    /// Recompute the CRC and compare with the stored value.
    pub fn verify_crc(&self) -> bool {
        let stored = u32::from_be_bytes([
            self.prefix[6],
            self.prefix[7],
            self.prefix[8],
            self.prefix[9],
        ]);
        stored == self.compute_crc()
    }

    fn compute_crc(&self) -> u32 {
        let mut covered =
            Vec::with_capacity(CRC_COVERED_PREFIX + self.options.len() * 4);
        covered.extend_from_slice(&self.prefix[..CRC_COVERED_PREFIX]);
        for opt in &self.options {
            covered.extend_from_slice(&opt.to_be_bytes());
        }
        crc32fast::hash(&covered)
    }

    /// Install a received prefix. Options and payload are cleared; the
    /// caller reads them next guided by the header fields.
    pub(crate) fn set_prefix(&mut self, prefix: [u8; FIXED_PREFIX_SIZE]) {
        self.prefix = prefix;
        self.options.clear();
        self.payload.clear();
    }

    /// Install options parsed from received bytes without touching the
    /// header count nibble.
    pub(crate) fn set_received_options(&mut self, raw: &[u8]) {
        debug_assert_eq!(raw.len() % 4, 0);
        self.options.clear();
        for chunk in raw.chunks_exact(4) {
            self.options
                .push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
    }

    /// Total wire size of this frame.
    pub fn wire_len(&self) -> usize {
        FIXED_PREFIX_SIZE + self.options.len() * 4 + self.payload.len()
    }

    /// Append the full wire image (prefix, options, payload) to `out`.
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.reserve(self.wire_len());
        out.put_slice(&self.prefix);
        for opt in &self.options {
            out.put_u32(*opt);
        }
        out.put_slice(&self.payload);
    }
}
