//! # Upstream protocol interface
//!
//! The Protocol Manager that parses application-level headers inside a
//! reassembled message's first fragment is an external collaborator (out of
//! scope, §1) — this trait is the seam it plugs into.

/// Parses the protocol header embedded in the first fragment of a message.
///
/// Returns `(header_len, total_len)`: `header_len` is the number of bytes at
/// the front of `buf` that belong to the upper-layer header (not part of
/// the reassembled payload), and `total_len` is the full length of the
/// reassembled message payload the caller should allocate for. A
/// `total_len` of zero signals an empty message — `recv` short-circuits
/// without consuming further fragments.
pub trait ProtocolHeaderParser: Send + Sync {
    fn parse_header(&self, buf: &[u8]) -> Option<(usize, usize)>;
}

/// Test/demo collaborator for single-segment messages: zero-length
/// upper-layer header, `total_len` equal to whatever the first (and only)
/// fragment delivers. This matches the assumption spec scenarios make for
/// the non-fragmented case ("Assumes upstream protocol header is
/// zero-length in tests"). It under-reports `total_len` for fragmented
/// messages, since it has no way to see past the first fragment — use
/// [`FnParser`] there instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProtocolParser;

impl ProtocolHeaderParser for NullProtocolParser {
    fn parse_header(&self, buf: &[u8]) -> Option<(usize, usize)> {
        Some((0, buf.len()))
    }
}

/// A `ProtocolHeaderParser` backed by an arbitrary closure, for tests that
/// need to assert a specific `(header_len, total_len)` regardless of what
/// the first fragment's bytes actually contain — standing in for a real
/// upper-layer protocol that embeds the reassembled message's total length
/// in its header.
pub struct FnParser<F>(pub F)
where
    F: Fn(&[u8]) -> Option<(usize, usize)> + Send + Sync;

impl<F> ProtocolHeaderParser for FnParser<F>
where
    F: Fn(&[u8]) -> Option<(usize, usize)> + Send + Sync,
{
    fn parse_header(&self, buf: &[u8]) -> Option<(usize, usize)> {
        (self.0)(buf)
    }
}
