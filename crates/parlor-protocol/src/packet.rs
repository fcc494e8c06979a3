//! The binary packet: a write-once, read-once buffer with a length prefix.
//!
//! A [`Packet`] is used in one of two modes, never both at once:
//!
//! - **Writing**: start from [`Packet::with_tag`] (or [`Packet::new`]),
//!   append fields with the `add_*` methods, then [`write_to`](Packet::write_to)
//!   a connection.
//! - **Reading**: [`read_from`](Packet::read_from) a connection, then pull
//!   fields out with [`u8`](Packet::u8), [`u16`](Packet::u16),
//!   [`u32`](Packet::u32) and [`string`](Packet::string) in the same order
//!   the writer appended them.
//!
//! The reader and writer must agree on the schema of each message tag.
//! Nothing in the bytes says "this is a string": a `u16` read where the
//! writer put a string silently yields the string's length prefix.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use crate::ProtocolError;

/// Longest string (in bytes) a packet can carry.
pub const PACKET_STRING_MAX: usize = 1022;

/// Largest payload a packet can carry: one maximum-length string plus its
/// own 16-bit length prefix.
pub const PACKET_PAYLOAD_MAX: usize = PACKET_STRING_MAX + 2;

/// Bytes taken by the length prefix on the wire.
const HEADER_LEN: usize = 2;

/// The result of waiting for a packet on a connection.
///
/// These are distinct outcomes, not a pass/fail flag. Callers branch on
/// them: a timeout means "nothing yet, ask again later"; a corrupt packet
/// means the stream can no longer be trusted and must be closed.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete packet was received and is ready to be read.
    Received,
    /// Nothing arrived before the read timeout. The connection is fine.
    TimedOut,
    /// The peer closed the connection (or it was reset).
    Disconnected,
    /// The declared length was zero, too large, or did not match the
    /// bytes that actually arrived.
    Corrupt,
}

/// A length-prefixed binary message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    cursor: usize,
}

impl Packet {
    /// Creates an empty packet ready for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a packet whose first payload byte is `tag`.
    pub fn with_tag(tag: u8) -> Self {
        Self {
            payload: vec![tag],
            cursor: 0,
        }
    }

    /// Wraps an already-received payload for reading.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidLength`] if the payload is empty or
    /// longer than [`PACKET_PAYLOAD_MAX`].
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.is_empty() || payload.len() > PACKET_PAYLOAD_MAX {
            return Err(ProtocolError::InvalidLength(payload.len()));
        }
        Ok(Self {
            payload: payload.to_vec(),
            cursor: 0,
        })
    }

    /// Resets the packet to an empty, writable state.
    pub fn clear(&mut self) {
        self.payload.clear();
        self.cursor = 0;
    }

    /// Payload length in bytes (excluding the length prefix).
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if nothing has been written or received.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The payload bytes (excluding the length prefix).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The message tag: the first payload byte, if any.
    pub fn tag(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Bytes not yet consumed by the reader.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.cursor
    }

    // -----------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------

    fn reserve(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = PACKET_PAYLOAD_MAX - self.payload.len();
        if needed > remaining {
            return Err(ProtocolError::PacketFull { needed, remaining });
        }
        Ok(())
    }

    /// Appends one byte.
    pub fn add_u8(&mut self, value: u8) -> Result<(), ProtocolError> {
        self.reserve(1)?;
        self.payload.push(value);
        Ok(())
    }

    /// Appends a boolean as a single `0`/`1` byte.
    pub fn add_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.add_u8(u8::from(value))
    }

    /// Appends a little-endian `u16`.
    pub fn add_u16(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.reserve(2)?;
        self.payload.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Appends a little-endian `u32`.
    pub fn add_u32(&mut self, value: u32) -> Result<(), ProtocolError> {
        self.reserve(4)?;
        self.payload.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Appends a string: a `u16` byte length, then the raw bytes.
    ///
    /// # Errors
    /// - [`ProtocolError::StringTooLong`] if the string exceeds
    ///   [`PACKET_STRING_MAX`] bytes.
    /// - [`ProtocolError::PacketFull`] if it does not fit in what is left
    ///   of the payload.
    ///
    /// On error the packet is left unchanged.
    pub fn add_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        let bytes = value.as_bytes();
        if bytes.len() > PACKET_STRING_MAX {
            return Err(ProtocolError::StringTooLong {
                len: bytes.len(),
                max: PACKET_STRING_MAX,
            });
        }
        self.reserve(2 + bytes.len())?;
        // Checked above: fits in a u16.
        self.payload
            .extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        self.payload.extend_from_slice(bytes);
        Ok(())
    }

    /// Appends an optional string; `None` is written as an empty string.
    pub fn add_opt_str(
        &mut self,
        value: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.add_str(value.unwrap_or(""))
    }

    // -----------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------

    fn take(&mut self, needed: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        let start = self.cursor;
        self.cursor += needed;
        Ok(&self.payload[start..self.cursor])
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a `0`/`1` byte as a boolean. Any non-zero byte is `true`.
    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    /// Reads a little-endian `u16`.
    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<String, ProtocolError> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?.to_vec();
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::InvalidValue(format!("string is not UTF-8: {e}"))
        })
    }

    /// Reads a string written by [`add_opt_str`](Self::add_opt_str).
    pub fn opt_string(&mut self) -> Result<Option<String>, ProtocolError> {
        let s = self.string()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    // -----------------------------------------------------------------
    // Connection I/O
    // -----------------------------------------------------------------

    /// The full frame: the 2-byte little-endian length, then the payload.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_LEN + self.payload.len());
        // The payload never exceeds PACKET_PAYLOAD_MAX, well below u16::MAX.
        frame.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }

    /// Writes the length prefix and payload to `writer`.
    ///
    /// Partial writes are retried until every byte is sent or the
    /// connection reports an error.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.payload.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to send an empty packet",
            ));
        }
        writer.write_all(&self.to_frame()).await?;
        writer.flush().await
    }

    /// Waits for the next packet on `reader` and loads it for reading.
    ///
    /// `wait` bounds how long to wait for the packet to *start*. Once the
    /// first length byte has arrived the rest of the frame must follow
    /// within another `wait`; a peer that stalls mid-frame is reported as
    /// [`ReadOutcome::Corrupt`].
    ///
    /// Waiting for the first byte is cancel-safe: if the future is dropped
    /// before a byte arrives, nothing has been consumed from the stream.
    pub async fn read_from<R>(
        &mut self,
        reader: &mut R,
        wait: Duration,
    ) -> ReadOutcome
    where
        R: AsyncRead + Unpin,
    {
        self.clear();

        let mut low = [0u8; 1];
        match time::timeout(wait, reader.read(&mut low)).await {
            Err(_) => return ReadOutcome::TimedOut,
            Ok(Ok(0)) | Ok(Err(_)) => return ReadOutcome::Disconnected,
            Ok(Ok(_)) => {}
        }

        let body = async {
            let mut high = [0u8; 1];
            reader.read_exact(&mut high).await?;
            let declared = usize::from(u16::from_le_bytes([low[0], high[0]]));
            if declared == 0 || declared > PACKET_PAYLOAD_MAX {
                return Ok(None);
            }
            let mut payload = vec![0u8; declared];
            reader.read_exact(&mut payload).await?;
            Ok::<_, io::Error>(Some(payload))
        };

        match time::timeout(wait, body).await {
            Ok(Ok(Some(payload))) => {
                self.payload = payload;
                ReadOutcome::Received
            }
            Ok(Ok(None)) => ReadOutcome::Corrupt,
            // The peer hung up before delivering the declared length.
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                ReadOutcome::Corrupt
            }
            Ok(Err(_)) => ReadOutcome::Disconnected,
            Err(_) => ReadOutcome::Corrupt,
        }
    }
}
