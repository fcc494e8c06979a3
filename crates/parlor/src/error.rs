//! Unified error type for the Parlor servers.

use parlor_protocol::{Gid, ProtocolError};
use parlor_room::RoomError;
use parlor_session::{SessionError, StoreError};
use parlor_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A presence error (already logged in, muted).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A data-layer error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration file couldn't be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No configured game server answered the status probe.
    #[error("no game server available")]
    NoGameServer,

    /// The chosen game server didn't open the room.
    #[error("game server refused room {gid}: {reason}")]
    RoomRefused { gid: Gid, reason: String },

    /// An inter-server exchange took longer than the configured timeout.
    #[error("game server did not answer in time")]
    ServerTimeout,
}

impl ParlorError {
    /// Returns `true` if the error was caused by what the client asked
    /// for. Its text is then safe to show them; anything else is reported
    /// as a generic server error.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Room(_) | Self::Session(_) => true,
            Self::Store(e) => e.is_validation(),
            _ => false,
        }
    }
}
