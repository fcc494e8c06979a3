//! Wire protocol for Parlor.
//!
//! This crate defines the bytes that travel between clients, the lobby
//! server and the game servers:
//!
//! - **Packet** ([`Packet`]): a length-prefixed binary buffer. Fields are
//!   appended and read back in a fixed order; there is no type tagging
//!   beyond the first payload byte, which names the message.
//! - **Tags** ([`tags`]): the one-byte message identifiers, grouped by
//!   subsystem.
//! - **Messages** ([`LobbyRequest`], [`LobbyEvent`], [`GameRequest`],
//!   [`GameEvent`], [`PeerMessage`]): typed views over packets. Each one
//!   knows its own field schema through the [`WireMessage`] trait.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Wire format
//!
//! ```text
//! ┌──────────────┬─────┬──────────────────────────────┐
//! │ len: u16 LE  │ tag │ fields (declaration order)   │
//! └──────────────┴─────┴──────────────────────────────┘
//!                 └──────────── len bytes ───────────┘
//! ```
//!
//! Integers are little-endian. Strings are a `u16` byte length followed by
//! UTF-8 bytes.

mod error;
mod game;
mod lobby;
mod message;
mod packet;
mod peer;
pub mod tags;
mod types;

pub use error::ProtocolError;
pub use game::{GameEvent, GameRequest, Seat};
pub use lobby::{LobbyEvent, LobbyRequest};
pub use message::WireMessage;
pub use packet::{Packet, ReadOutcome, PACKET_PAYLOAD_MAX, PACKET_STRING_MAX};
pub use peer::{ConnectionKind, PeerMessage, StatusReport};
pub use types::{
    Gid, ListAction, ListKind, Profile, PropertyRedistribution, RoomListEntry,
    RoomStatus, RuleSet, Statistics, Visibility, SLOT_COUNT,
};
