//! # Segment
//!
//! The fixed-capacity transmission unit and its on-wire header.
//!
//! ## Segment header (first [`SEG_HEADER_SIZE`] bytes of every segment, big-endian)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number (32)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Payload Length (32)                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Flags (32)                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Send-start Timestamp, seconds (32)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Send-start Timestamp, microseconds (32)         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut};

// ─── Compile-time parameters ────────────────────────────────────────────────

/// Size in bytes of a full segment buffer, header included. Compile-time
/// parameter — a real deployment of this crate would tune it to the MTU of
/// the cheapest-common-denominator transport in the bonding pool.
pub const SEG_SIZE: usize = 1024;

/// Size in bytes of the in-band segment header.
pub const SEG_HEADER_SIZE: usize = 20;

/// Maximum application payload carried by a single segment.
pub const SEG_PAYLOAD_SIZE: usize = SEG_SIZE - SEG_HEADER_SIZE;

/// Free-pool high-water mark. Once `FreeSegmentPool::push` observes more
/// than this many idle segments, half of them are deallocated.
pub const SEG_FREE_THRESHOLD: usize = 512;

// ─── Flags ───────────────────────────────────────────────────────────────────

/// "More fragments follow" — set on every fragment but the last of a
/// logical message.
pub const SEG_FLAG_MF: u32 = 0x01;

/// This segment belongs to the control sequence class.
pub const SEG_FLAG_CONTROL: u32 = 0x02;

// ─── Sequence class ──────────────────────────────────────────────────────────

/// The two independent 32-bit sequence spaces the manager maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqClass {
    Control,
    Data,
}

impl SeqClass {
    pub const COUNT: usize = 2;

    #[inline]
    pub fn index(self) -> usize {
        match self {
            SeqClass::Control => 0,
            SeqClass::Data => 1,
        }
    }

    #[inline]
    pub fn from_flag(flag: u32) -> SeqClass {
        if flag & SEG_FLAG_CONTROL != 0 {
            SeqClass::Control
        } else {
            SeqClass::Data
        }
    }

    /// Map a raw class identifier (as might arrive on the wire in a peer's
    /// retransmit request) to a `SeqClass`. `UnknownClass` is reachable here
    /// even though the in-process enum is exhaustive, since this boundary
    /// accepts an untrusted `u8` from outside the process.
    pub fn from_u8(v: u8) -> Result<SeqClass, crate::error::SegmentError> {
        match v {
            0 => Ok(SeqClass::Control),
            1 => Ok(SeqClass::Data),
            _ => Err(crate::error::SegmentError::UnknownClass),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            SeqClass::Control => 0,
            SeqClass::Data => 1,
        }
    }
}

// ─── Segment ─────────────────────────────────────────────────────────────────

/// A fixed-capacity unit of transmission: header fields plus a `SEG_SIZE`
/// buffer. The header fields are authoritative; `buffer`'s first
/// [`SEG_HEADER_SIZE`] bytes mirror them only after [`Segment::serialize_header`]
/// has run, and only up to the point a peer field is mutated again — callers
/// must re-serialize before handing a segment to a transport.
pub struct Segment {
    pub buffer: Box<[u8; SEG_SIZE]>,
    pub seq_no: u32,
    /// Payload length, excluding the segment header.
    pub len: u32,
    pub flag: u32,
    pub send_start_ts_sec: i32,
    pub send_start_ts_usec: i32,
}

impl Segment {
    /// Allocate a fresh, zeroed segment. Used by the free pool on a miss.
    pub fn zeroed() -> Self {
        Segment {
            buffer: Box::new([0u8; SEG_SIZE]),
            seq_no: 0,
            len: 0,
            flag: 0,
            send_start_ts_sec: 0,
            send_start_ts_usec: 0,
        }
    }

    /// Reset metadata fields to zero. The buffer's contents are left as-is —
    /// callers must not read stale payload bytes beyond `len`.
    pub fn reset_metadata(&mut self) {
        self.seq_no = 0;
        self.len = 0;
        self.flag = 0;
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.flag & SEG_FLAG_CONTROL != 0
    }

    #[inline]
    pub fn more_fragments(&self) -> bool {
        self.flag & SEG_FLAG_MF != 0
    }

    /// Mirror the in-struct header fields into the first `SEG_HEADER_SIZE`
    /// bytes of `buffer`, network byte order. Must run before a segment is
    /// handed to a transport adapter.
    pub fn serialize_header(&mut self) {
        let mut head = &mut self.buffer[..SEG_HEADER_SIZE];
        head.put_u32(self.seq_no);
        head.put_u32(self.len);
        head.put_u32(self.flag);
        head.put_i32(self.send_start_ts_sec);
        head.put_i32(self.send_start_ts_usec);
    }

    /// Payload slice, `buffer[SEG_HEADER_SIZE..SEG_HEADER_SIZE + len]`.
    pub fn payload(&self) -> &[u8] {
        let len = self.len as usize;
        &self.buffer[SEG_HEADER_SIZE..SEG_HEADER_SIZE + len]
    }

    /// Copy `data` into the payload region and set `len` accordingly. Panics
    /// if `data` does not fit in `SEG_PAYLOAD_SIZE` — callers are expected to
    /// have already chunked the input.
    pub fn set_payload(&mut self, data: &[u8]) {
        assert!(data.len() <= SEG_PAYLOAD_SIZE);
        self.buffer[SEG_HEADER_SIZE..SEG_HEADER_SIZE + data.len()].copy_from_slice(data);
        self.len = data.len() as u32;
    }
}

/// The five header fields, decoded independently of a `Segment`. Used both
/// by [`deserialize_header`] and by property tests of the round-trip
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub seq_no: u32,
    pub len: u32,
    pub flag: u32,
    pub send_start_ts_sec: i32,
    pub send_start_ts_usec: i32,
}

/// Serialize a header tuple into a buffer in network byte order. The
/// inverse of [`deserialize_header`].
pub fn serialize_header(header: &SegmentHeader, buf: &mut [u8; SEG_HEADER_SIZE]) {
    let mut head = &mut buf[..];
    head.put_u32(header.seq_no);
    head.put_u32(header.len);
    head.put_u32(header.flag);
    head.put_i32(header.send_start_ts_sec);
    head.put_i32(header.send_start_ts_usec);
}

/// Deserialize a header from the first `SEG_HEADER_SIZE` bytes of `buf`.
/// Returns `None` if `buf` is shorter than `SEG_HEADER_SIZE`.
pub fn deserialize_header(buf: &[u8]) -> Option<SegmentHeader> {
    if buf.len() < SEG_HEADER_SIZE {
        return None;
    }
    let mut head = &buf[..SEG_HEADER_SIZE];
    Some(SegmentHeader {
        seq_no: head.get_u32(),
        len: head.get_u32(),
        flag: head.get_u32(),
        send_start_ts_sec: head.get_i32(),
        send_start_ts_usec: head.get_i32(),
    })
}
