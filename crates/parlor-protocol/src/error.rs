//! Error types for the protocol layer.
//!
//! Every variant here is a *protocol error* in the server's error taxonomy:
//! the peer sent (or we tried to build) something that does not fit the
//! wire format. Callers close the offending connection; the server keeps
//! running.

/// Errors that can occur while building or parsing a packet.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A string field is longer than [`PACKET_STRING_MAX`](crate::PACKET_STRING_MAX).
    ///
    /// Oversized strings used to be dropped silently, which left the
    /// reader misaligned with the writer. They are now refused outright.
    #[error("string of {len} bytes exceeds the {max}-byte limit")]
    StringTooLong { len: usize, max: usize },

    /// Appending a field would overflow the packet's payload capacity.
    #[error("packet full: field needs {needed} bytes, {remaining} remaining")]
    PacketFull { needed: usize, remaining: usize },

    /// A read asked for more bytes than the payload still holds.
    #[error("packet truncated: field needs {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The declared payload length is zero or larger than the maximum.
    #[error("invalid payload length {0}")]
    InvalidLength(usize),

    /// The message tag is not defined in this namespace.
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),

    /// A field decoded but holds a value outside its domain
    /// (unknown enum discriminant, bad UTF-8, wrong seat count, ...).
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
