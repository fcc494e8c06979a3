//! The [`WireMessage`] trait: typed messages that map to and from packets.
//!
//! A packet is just bytes. Each message enum in this crate knows the field
//! schema behind its tags, and implements this trait so the transport layer
//! can send and receive typed values without knowing any of those schemas.

use crate::{Packet, ProtocolError};

/// A message that can be written into, and read out of, a [`Packet`].
///
/// `Send + Sync + 'static`: messages are queued on channels and written by
/// a per-connection writer task, which holds a borrow across the write.
pub trait WireMessage: Sized + Send + Sync + 'static {
    /// Builds a packet holding this message, tag first.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if a field does not fit (for example a
    /// string over the size limit).
    fn encode(&self) -> Result<Packet, ProtocolError>;

    /// Reads a message from a freshly received packet, tag first.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownTag`] if the tag is not part of this
    /// message's namespace, or any read error if the fields don't match
    /// the tag's schema.
    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameEvent, GameRequest, LobbyEvent, LobbyRequest, PeerMessage, StatusReport};

    fn shareable<M: WireMessage>() {}

    #[test]
    fn test_every_message_can_cross_task_boundaries() {
        shareable::<LobbyRequest>();
        shareable::<LobbyEvent>();
        shareable::<GameRequest>();
        shareable::<GameEvent>();
        shareable::<PeerMessage>();
        shareable::<StatusReport>();
    }
}
