//! Engine configuration and the room state machine.

use std::time::Duration;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a [`RoomEngine`](crate::RoomEngine) runs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a new room waits for its owner before closing.
    pub owner_join_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner_join_timeout: Duration::from_secs(5 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a game-server room.
///
/// Phases advance strictly in order, except that any live phase may jump
/// straight to `Closed`:
///
/// ```text
/// Vacant → WaitingForOwner → Populating → Ready → InProgress → Closed
///               │                 │          │
///               └─────────────────┴──────────┴──────→ Closed
/// ```
///
/// - **Vacant**: constructed, not yet registered with an engine.
/// - **WaitingForOwner**: registered; only the owner may sit down. Closes
///   if the owner doesn't arrive in time.
/// - **Populating**: the owner is seated; others join and get admitted.
/// - **Ready**: seats are settled; the worker is about to start the game.
/// - **InProgress**: computers backfilled, turn order announced.
/// - **Closed**: terminal. The engine forgets the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Vacant,
    WaitingForOwner,
    Populating,
    Ready,
    InProgress,
    Closed,
}

impl RoomPhase {
    /// Returns `true` if players may still take seats.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForOwner | Self::Populating)
    }

    /// Returns `true` once the room can never be used again.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The next phase in the normal progression.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Vacant => Some(Self::WaitingForOwner),
            Self::WaitingForOwner => Some(Self::Populating),
            Self::Populating => Some(Self::Ready),
            Self::Ready => Some(Self::InProgress),
            Self::InProgress => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is legal.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Closed && self != Self::Closed)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vacant => write!(f, "Vacant"),
            Self::WaitingForOwner => write!(f, "WaitingForOwner"),
            Self::Populating => write!(f, "Populating"),
            Self::Ready => write!(f, "Ready"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
