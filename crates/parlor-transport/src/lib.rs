//! Transport layer for Parlor.
//!
//! Everything here speaks bytes over TCP; message schemas live in
//! `parlor-protocol`.
//!
//! - [`Listener`] binds a port and hands out accepted streams.
//! - [`Connection`] wraps one stream with a read timeout and reads/writes
//!   whole packets as typed messages. It can be split into a
//!   [`ConnectionReader`] and a [`ConnectionWriter`] so one task can read
//!   while another writes.
//! - [`spawn_writer`] drains an [`Outbound`] queue into a writer. Shared
//!   state (rooms, presence) only ever pushes onto such queues, so no lock
//!   is held across network I/O.
//! - [`SocketMultiplexer`] waits on many not-yet-identified sockets at
//!   once, with a deadline and a cross-task [`Interrupter`].

mod connection;
mod error;
mod multiplexer;
mod writer;

pub use connection::{Connection, ConnectionReader, ConnectionWriter, Listener};
pub use error::TransportError;
pub use multiplexer::{Interrupter, PollResult, SocketMultiplexer};
pub use writer::{spawn_writer, Outbound, Outbox};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
