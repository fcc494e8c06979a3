//! Value types shared by the lobby, the game servers and the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Packet, ProtocolError};

/// Number of player slots in every room, whether filled or not.
pub const SLOT_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Gid
// ---------------------------------------------------------------------------

/// A game/room id, assigned by the lobby and unique for the room's lifetime.
///
/// Newtype over `u32` so a gid can't be mixed up with a slot index or a
/// player count. Travels on the wire as a plain little-endian `u32`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Gid(pub u32);

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Small enums with a one-byte wire form
// ---------------------------------------------------------------------------

/// Generates `TryFrom<u8>` and `From<Self> for u8` for a fieldless enum
/// with explicit discriminants.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, ProtocolError> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(ProtocolError::InvalidValue(format!(
                        concat!("unknown ", stringify!($name), " {}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// What happens to a bankrupt player's properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyRedistribution {
    /// Properties are dealt out at random to the remaining players.
    RandomToPlayers = 0,
    /// Properties go back to the bank.
    #[default]
    ReturnToBank = 1,
}
wire_enum!(PropertyRedistribution { RandomToPlayers = 0, ReturnToBank = 1 });

/// Whether a room shows up in the lobby's room list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Visibility {
    #[default]
    Public = 0,
    Private = 1,
}
wire_enum!(Visibility { Public = 0, Private = 1 });

/// Lobby-side status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoomStatus {
    Open = 0,
    InProgress = 1,
    Closed = 2,
}
wire_enum!(RoomStatus { Open = 0, InProgress = 1, Closed = 2 });

/// Which of a user's lists an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ListKind {
    Friends = 0,
    Blocked = 1,
}
wire_enum!(ListKind { Friends = 0, Blocked = 1 });

/// Add to or remove from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListAction {
    Add = 0,
    Remove = 1,
}
wire_enum!(ListAction { Add = 0, Remove = 1 });

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// The house rules of one room. Fixed once the game starts.
///
/// Deserializable so servers can carry a default rule set in their config
/// file; missing fields fall back to [`RuleSet::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Turn limit. `0` means play until one player remains.
    pub max_turns: u16,
    /// How many of the four slots humans may fill (1–4). The rest are
    /// backfilled with computer players.
    pub max_humans: u8,
    /// Cash awarded for landing on Free Parking. `0` disables the reward.
    pub free_parking_reward: u32,
    /// What happens to a bankrupt player's properties.
    pub redistribution: PropertyRedistribution,
    /// Whether players may choose between the flat and the percentage
    /// income tax.
    pub income_tax_choice: bool,
    /// Password required to join, if any.
    pub password: Option<String>,
    /// Only the owner's friends may join.
    pub friends_only: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            max_turns: 0,
            max_humans: SLOT_COUNT as u8,
            free_parking_reward: 0,
            redistribution: PropertyRedistribution::default(),
            income_tax_choice: true,
            password: None,
            friends_only: false,
        }
    }
}

impl RuleSet {
    /// Checks that the rule set can describe a real room.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.max_humans == 0 || usize::from(self.max_humans) > SLOT_COUNT {
            return Err(ProtocolError::InvalidValue(format!(
                "max_humans must be between 1 and {SLOT_COUNT}, got {}",
                self.max_humans
            )));
        }
        Ok(())
    }

    /// Returns `true` if `given` opens this room. Rooms without a password
    /// accept anything.
    pub fn password_matches(&self, given: Option<&str>) -> bool {
        match self.password.as_deref() {
            None => true,
            Some(expected) => given == Some(expected),
        }
    }

    /// Appends the rule set's fields to `packet`.
    pub fn encode_into(&self, packet: &mut Packet) -> Result<(), ProtocolError> {
        packet.add_u16(self.max_turns)?;
        packet.add_u8(self.max_humans)?;
        packet.add_u32(self.free_parking_reward)?;
        packet.add_u8(self.redistribution.into())?;
        packet.add_bool(self.income_tax_choice)?;
        packet.add_opt_str(self.password.as_deref())?;
        packet.add_bool(self.friends_only)
    }

    /// Reads a rule set written by [`encode_into`](Self::encode_into) and
    /// validates it.
    pub fn decode_from(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let rules = Self {
            max_turns: packet.u16()?,
            max_humans: packet.u8()?,
            free_parking_reward: packet.u32()?,
            redistribution: packet.u8()?.try_into()?,
            income_tax_choice: packet.bool()?,
            password: packet.opt_string()?,
            friends_only: packet.bool()?,
        };
        rules.validate()?;
        Ok(rules)
    }
}

// ---------------------------------------------------------------------------
// Data-layer records
// ---------------------------------------------------------------------------

/// Win/loss record of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub games_played: u32,
    pub games_won: u32,
    pub games_abandoned: u32,
}

impl Statistics {
    pub(crate) fn encode_into(&self, packet: &mut Packet) -> Result<(), ProtocolError> {
        packet.add_u32(self.games_played)?;
        packet.add_u32(self.games_won)?;
        packet.add_u32(self.games_abandoned)
    }

    pub(crate) fn decode_from(packet: &mut Packet) -> Result<Self, ProtocolError> {
        Ok(Self {
            games_played: packet.u32()?,
            games_won: packet.u32()?,
            games_abandoned: packet.u32()?,
        })
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub email: Option<String>,
}

/// One row of the lobby's room list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomListEntry {
    pub gid: Gid,
    pub owner: String,
    /// Users who have joined through the lobby.
    pub players: u8,
    /// The rule set's human-player bound.
    pub max_players: u8,
    /// A password is required.
    pub locked: bool,
    pub friends_only: bool,
    pub status: RoomStatus,
}

impl RoomListEntry {
    pub(crate) fn encode_into(&self, packet: &mut Packet) -> Result<(), ProtocolError> {
        packet.add_u32(self.gid.0)?;
        packet.add_str(&self.owner)?;
        packet.add_u8(self.players)?;
        packet.add_u8(self.max_players)?;
        packet.add_bool(self.locked)?;
        packet.add_bool(self.friends_only)?;
        packet.add_u8(self.status.into())
    }

    pub(crate) fn decode_from(packet: &mut Packet) -> Result<Self, ProtocolError> {
        Ok(Self {
            gid: Gid(packet.u32()?),
            owner: packet.string()?,
            players: packet.u8()?,
            max_players: packet.u8()?,
            locked: packet.bool()?,
            friends_only: packet.bool()?,
            status: packet.u8()?.try_into()?,
        })
    }
}
