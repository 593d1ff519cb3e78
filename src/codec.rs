//! Message framing: header, routing block, payload, trailer, and checksum
//! validation.
//!
//! Layout (§4.1; the `header`/`payload`/`trailer` triple is bit-exact and
//! normative for interop, the `routing` block is this implementation's
//! chosen home for the `{msg_id, producer_id, consumer_id, meta_type}`
//! identity fields the distilled wire diagram leaves unplaced — see
//! `DESIGN.md`):
//!
//! ```text
//! [ header: 32 B ][ routing: 24 B ][ meta: 64 B ][ payload: size B, padded up to 8 B ][ trailer: 8 B ]
//! header  = { magic:u32, size:u32, seq:u64, timestamp_us:u64, checksum:u32, flags:u32 }
//! routing = { producer_id:u32, consumer_id:u32, msg_id:u64, meta_type:u32, reserved:u32 }
//! trailer = { end_marker:u32 = 0xDEADBEEF, checksum_copy:u32 }
//! ```
//!
//! Integers are host byte order: this is an in-process bus, not a wire format.
//! The checksum function is CRC-32 (`crc32fast`, IEEE polynomial) over the
//! payload bytes only — padding is never hashed. This resolves the spec's
//! Open Question #1 (see `DESIGN.md`).

use crate::config::{END_MARKER, MAGIC};

/// Size in bytes of the fixed, bit-exact header.
pub const HEADER_SIZE: usize = 32;
/// Size in bytes of the routing block.
pub const ROUTING_SIZE: usize = 24;
/// Size in bytes of the fixed, bit-exact trailer.
pub const TRAILER_SIZE: usize = 8;
/// Fixed size of the `meta` side-channel carried alongside the payload.
pub const META_SIZE: usize = 64;
/// Bytes of bookkeeping a slot needs in addition to the payload itself.
pub const SLOT_OVERHEAD: usize = HEADER_SIZE + ROUTING_SIZE + META_SIZE + TRAILER_SIZE;

/// Rounds `n` up to the next multiple of 8.
#[inline]
#[must_use]
pub const fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Parsed, fixed-size message header (bit-exact, §4.1/§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub size: u32,
    pub seq: u64,
    pub timestamp_us: u64,
    pub checksum: u32,
    pub flags: u32,
}

impl Header {
    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= HEADER_SIZE);
        out[0..4].copy_from_slice(&self.magic.to_ne_bytes());
        out[4..8].copy_from_slice(&self.size.to_ne_bytes());
        out[8..16].copy_from_slice(&self.seq.to_ne_bytes());
        out[16..24].copy_from_slice(&self.timestamp_us.to_ne_bytes());
        out[24..28].copy_from_slice(&self.checksum.to_ne_bytes());
        out[28..32].copy_from_slice(&self.flags.to_ne_bytes());
    }

    #[must_use]
    pub fn read_from(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_SIZE);
        Self {
            magic: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            size: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            seq: u64::from_ne_bytes(buf[8..16].try_into().unwrap()),
            timestamp_us: u64::from_ne_bytes(buf[16..24].try_into().unwrap()),
            checksum: u32::from_ne_bytes(buf[24..28].try_into().unwrap()),
            flags: u32::from_ne_bytes(buf[28..32].try_into().unwrap()),
        }
    }
}

/// Identity/routing fields carried alongside the bit-exact header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub producer_id: u32,
    pub consumer_id: u32,
    pub msg_id: u64,
    pub meta_type: u32,
}

impl Routing {
    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= ROUTING_SIZE);
        out[0..4].copy_from_slice(&self.producer_id.to_ne_bytes());
        out[4..8].copy_from_slice(&self.consumer_id.to_ne_bytes());
        out[8..16].copy_from_slice(&self.msg_id.to_ne_bytes());
        out[16..20].copy_from_slice(&self.meta_type.to_ne_bytes());
        out[20..24].fill(0); // reserved
    }

    #[must_use]
    pub fn read_from(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= ROUTING_SIZE);
        Self {
            producer_id: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            consumer_id: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
            msg_id: u64::from_ne_bytes(buf[8..16].try_into().unwrap()),
            meta_type: u32::from_ne_bytes(buf[16..20].try_into().unwrap()),
        }
    }
}

/// Parsed, fixed-size trailer (bit-exact, §4.1/§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub end_marker: u32,
    pub checksum_copy: u32,
}

impl Trailer {
    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= TRAILER_SIZE);
        out[0..4].copy_from_slice(&self.end_marker.to_ne_bytes());
        out[4..8].copy_from_slice(&self.checksum_copy.to_ne_bytes());
    }

    #[must_use]
    pub fn read_from(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= TRAILER_SIZE);
        Self {
            end_marker: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            checksum_copy: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
        }
    }
}

/// Computes the deterministic payload checksum (CRC-32, IEEE polynomial).
///
/// Writer and reader call exactly this function; there is no second checksum
/// routine anywhere in the crate (resolves Open Question #1).
#[inline]
#[must_use]
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Outcome of validating a slot's framed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Corrupt,
}

/// Byte offsets within a framed slot, given a declared payload size.
struct Layout {
    routing_start: usize,
    meta_start: usize,
    payload_start: usize,
    payload_padded_end: usize,
    trailer_end: usize,
}

const fn layout_for(payload_len: usize) -> Layout {
    let routing_start = HEADER_SIZE;
    let meta_start = routing_start + ROUTING_SIZE;
    let payload_start = meta_start + META_SIZE;
    let payload_padded_end = payload_start + align8(payload_len);
    let trailer_end = payload_padded_end + TRAILER_SIZE;
    Layout { routing_start, meta_start, payload_start, payload_padded_end, trailer_end }
}

/// Encodes a full message capsule into `slot[..]`. Returns the number of
/// bytes written.
///
/// # Panics
///
/// Panics if `slot` is too small, or if `meta` exceeds [`META_SIZE`].
#[allow(clippy::too_many_arguments)]
pub fn encode(
    slot: &mut [u8],
    seq: u64,
    timestamp_us: u64,
    routing: Routing,
    meta: &[u8],
    payload: &[u8],
) -> usize {
    assert!(meta.len() <= META_SIZE, "meta exceeds META_SIZE");
    let layout = layout_for(payload.len());
    assert!(slot.len() >= layout.trailer_end, "slot too small for framed message");

    let cksum = checksum(payload);
    let header = Header { magic: MAGIC, size: payload.len() as u32, seq, timestamp_us, checksum: cksum, flags: 0 };
    header.write_to(&mut slot[0..HEADER_SIZE]);
    routing.write_to(&mut slot[layout.routing_start..layout.meta_start]);

    let meta_region = &mut slot[layout.meta_start..layout.payload_start];
    meta_region[..meta.len()].copy_from_slice(meta);
    meta_region[meta.len()..].fill(0);

    slot[layout.payload_start..layout.payload_start + payload.len()].copy_from_slice(payload);
    // Alignment padding is never hashed; zero it for deterministic bytes.
    slot[layout.payload_start + payload.len()..layout.payload_padded_end].fill(0);

    let trailer = Trailer { end_marker: END_MARKER, checksum_copy: cksum };
    crate::invariants::debug_assert_checksum_copy_matches!(header.checksum, trailer.checksum_copy);
    trailer.write_to(&mut slot[layout.payload_padded_end..layout.trailer_end]);

    layout.trailer_end
}

/// Stateless validation of a previously-encoded slot (§4.1 `validate` contract).
/// Never mutates `slot`.
#[must_use]
pub fn validate(slot: &[u8]) -> Validation {
    if slot.len() < HEADER_SIZE + ROUTING_SIZE + META_SIZE + TRAILER_SIZE {
        return Validation::Corrupt;
    }
    let header = Header::read_from(&slot[0..HEADER_SIZE]);
    if header.magic != MAGIC {
        return Validation::Corrupt;
    }
    if header.size as usize > crate::config::MAX_MESSAGE_SIZE {
        return Validation::Corrupt;
    }

    let layout = layout_for(header.size as usize);
    if slot.len() < layout.trailer_end {
        return Validation::Corrupt;
    }

    let trailer = Trailer::read_from(&slot[layout.payload_padded_end..layout.trailer_end]);
    if trailer.end_marker != END_MARKER {
        return Validation::Corrupt;
    }
    if trailer.checksum_copy != header.checksum {
        return Validation::Corrupt;
    }

    let payload = &slot[layout.payload_start..layout.payload_start + header.size as usize];
    if checksum(payload) != header.checksum {
        return Validation::Corrupt;
    }

    Validation::Ok
}

/// Reads back `(header, routing, meta, payload)` from a slot already known to
/// be valid via [`validate`].
#[must_use]
pub fn decode(slot: &[u8]) -> (Header, Routing, &[u8], &[u8]) {
    let header = Header::read_from(&slot[0..HEADER_SIZE]);
    let layout = layout_for(header.size as usize);
    let routing = Routing::read_from(&slot[layout.routing_start..layout.meta_start]);
    let meta = &slot[layout.meta_start..layout.payload_start];
    let payload = &slot[layout.payload_start..layout.payload_start + header.size as usize];
    (header, routing, meta, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r() -> Routing {
        Routing { producer_id: 1, consumer_id: 2, msg_id: 99, meta_type: 7 }
    }

    fn framed_len(payload_len: usize) -> usize {
        layout_for(payload_len).trailer_end
    }

    #[test]
    fn round_trip_ok() {
        let mut buf = vec![0u8; framed_len(5)];
        encode(&mut buf, 42, 1000, r(), b"meta", b"hello");
        assert_eq!(validate(&buf), Validation::Ok);
        let (header, routing, meta, payload) = decode(&buf);
        assert_eq!(header.seq, 42);
        assert_eq!(routing.consumer_id, 2);
        assert_eq!(routing.msg_id, 99);
        assert_eq!(&meta[..4], b"meta");
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn corrupt_magic_detected() {
        let mut buf = vec![0u8; framed_len(5)];
        encode(&mut buf, 1, 0, r(), b"", b"hello");
        buf[0] ^= 0xFF;
        assert_eq!(validate(&buf), Validation::Corrupt);
    }

    #[test]
    fn flipped_payload_byte_detected() {
        let mut buf = vec![0u8; framed_len(5)];
        encode(&mut buf, 1, 0, r(), b"", b"hello");
        let payload_start = layout_for(5).payload_start;
        buf[payload_start] ^= 0x01;
        assert_eq!(validate(&buf), Validation::Corrupt);
    }

    #[test]
    fn torn_trailer_detected() {
        let mut buf = vec![0u8; framed_len(5)];
        encode(&mut buf, 1, 0, r(), b"", b"hello");
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert_eq!(validate(&buf), Validation::Corrupt);
    }

    #[test]
    fn zero_length_payload_is_valid() {
        let mut buf = vec![0u8; framed_len(0)];
        encode(&mut buf, 1, 0, r(), b"", b"");
        assert_eq!(validate(&buf), Validation::Ok);
    }

    #[test]
    fn oversized_payload_rejected_by_validate() {
        // A header claiming more than MAX_MESSAGE_SIZE is corrupt regardless
        // of what follows it.
        let mut buf = vec![0u8; framed_len(8)];
        encode(&mut buf, 1, 0, r(), b"", &[0u8; 8]);
        let mut header = Header::read_from(&buf[0..HEADER_SIZE]);
        header.size = (crate::config::MAX_MESSAGE_SIZE + 1) as u32;
        header.write_to(&mut buf[0..HEADER_SIZE]);
        assert_eq!(validate(&buf), Validation::Corrupt);
    }
}
