//! Slot occupants.

use parlor_protocol::GameEvent;
use parlor_transport::{Outbound, Outbox};

/// Outbound queue of a human player's game-server connection.
pub type PlayerSender = Outbox<GameEvent>;

/// A human seated in a room.
#[derive(Debug)]
pub struct Human {
    pub username: String,
    /// The owner has let this player take part. The owner is admitted
    /// from the start.
    pub admitted: bool,
    sender: PlayerSender,
}

impl Human {
    pub fn new(username: String, admitted: bool, sender: PlayerSender) -> Self {
        Self {
            username,
            admitted,
            sender,
        }
    }

    /// Queues `event` for this player's connection.
    pub fn send(&self, event: GameEvent) {
        // A closed queue means the connection is going away; its handler
        // removes the player.
        let _ = self.sender.send(Outbound::Send(event));
    }

    /// Asks the connection's writer to flush and close.
    pub fn disconnect(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

/// The occupant of one slot.
///
/// A slot's occupant never changes kind: a computer is only placed in an
/// empty slot at backfill time and stays until the room closes.
#[derive(Debug)]
pub enum Player {
    Human(Human),
    Computer { name: String },
}

impl Player {
    pub fn name(&self) -> &str {
        match self {
            Self::Human(h) => &h.username,
            Self::Computer { name } => name,
        }
    }

    pub fn as_human(&self) -> Option<&Human> {
        match self {
            Self::Human(h) => Some(h),
            Self::Computer { .. } => None,
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self, Self::Computer { .. })
    }
}
