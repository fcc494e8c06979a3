//! Error types for the room layer.
//!
//! Every variant's `Display` text is written for the player who caused
//! it; the servers send it to them as-is.

use parlor_protocol::Gid;

use crate::RoomPhase;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (or no longer does).
    #[error("room {0} not found")]
    NotFound(Gid),

    /// A room with this gid is already open.
    #[error("room {0} already exists")]
    AlreadyExists(Gid),

    /// Every human seat allowed by the rules is taken.
    #[error("room {0} is full")]
    RoomFull(Gid),

    /// Only the owner may be the first to sit down.
    #[error("owner hasn't joined yet")]
    OwnerNotJoined,

    /// The user already has a seat in this room.
    #[error("{username} is already in room {gid}")]
    AlreadyInRoom { username: String, gid: Gid },

    #[error("wrong room password")]
    WrongPassword,

    /// The operation is reserved for the room owner.
    #[error("only the room owner can do that")]
    NotOwner,

    /// The room is in a phase that doesn't allow this operation.
    #[error("room {gid} can't do that while {phase}")]
    InvalidState { gid: Gid, phase: RoomPhase },

    /// Nothing admittable sits in this slot.
    #[error("no player waiting in slot {0}")]
    InvalidSlot(u8),

    /// A rule change was refused.
    #[error("invalid rules: {0}")]
    InvalidRules(String),

    /// The owner already has a room that hasn't finished.
    #[error("{0} already has an open room")]
    AlreadyOwnsRoom(String),

    /// The room only admits the owner's friends.
    #[error("room {0} is for the owner's friends only")]
    FriendsOnly(Gid),

    /// The owner has blocked the user.
    #[error("you can't join room {0}")]
    Blocked(Gid),

    /// The room can't be joined through the lobby any more.
    #[error("room {0} is not open")]
    NotOpen(Gid),
}
