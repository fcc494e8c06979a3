//! Connection-type header, server-to-server control and status probes.

use crate::tags::{connection, peer};
use crate::{Gid, Packet, ProtocolError, RoomStatus, RuleSet, WireMessage};

/// The first raw byte on every new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Client,
    PeerServer,
    /// Answered with one [`StatusReport`], then closed.
    Status,
}

impl TryFrom<u8> for ConnectionKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            connection::CLIENT => Ok(Self::Client),
            connection::PEER_SERVER => Ok(Self::PeerServer),
            connection::STATUS => Ok(Self::Status),
            other => Err(ProtocolError::InvalidValue(format!(
                "unknown connection type {other:#04x}"
            ))),
        }
    }
}

impl From<ConnectionKind> for u8 {
    fn from(kind: ConnectionKind) -> u8 {
        match kind {
            ConnectionKind::Client => connection::CLIENT,
            ConnectionKind::PeerServer => connection::PEER_SERVER,
            ConnectionKind::Status => connection::STATUS,
        }
    }
}

/// Lobby ↔ game server control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// Lobby → game server: open a room and wait for its owner.
    OpenRoom {
        gid: Gid,
        owner: String,
        rules: RuleSet,
    },
    /// Game server → lobby: the outcome of an [`OpenRoom`](Self::OpenRoom).
    /// `reason` is empty when accepted.
    RoomOpened {
        gid: Gid,
        accepted: bool,
        reason: String,
    },
    /// Game server → lobby: a hosted room changed status.
    RoomStatus { gid: Gid, status: RoomStatus },
}

impl WireMessage for PeerMessage {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        let packet = match self {
            Self::OpenRoom { gid, owner, rules } => {
                let mut p = Packet::with_tag(peer::OPEN_ROOM);
                p.add_u32(gid.0)?;
                p.add_str(owner)?;
                rules.encode_into(&mut p)?;
                p
            }
            Self::RoomOpened {
                gid,
                accepted,
                reason,
            } => {
                let mut p = Packet::with_tag(peer::ROOM_OPENED);
                p.add_u32(gid.0)?;
                p.add_bool(*accepted)?;
                p.add_str(reason)?;
                p
            }
            Self::RoomStatus { gid, status } => {
                let mut p = Packet::with_tag(peer::ROOM_STATUS);
                p.add_u32(gid.0)?;
                p.add_u8((*status).into())?;
                p
            }
        };
        Ok(packet)
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let msg = match packet.u8()? {
            peer::OPEN_ROOM => Self::OpenRoom {
                gid: Gid(packet.u32()?),
                owner: packet.string()?,
                rules: RuleSet::decode_from(packet)?,
            },
            peer::ROOM_OPENED => Self::RoomOpened {
                gid: Gid(packet.u32()?),
                accepted: packet.bool()?,
                reason: packet.string()?,
            },
            peer::ROOM_STATUS => Self::RoomStatus {
                gid: Gid(packet.u32()?),
                status: packet.u8()?.try_into()?,
            },
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        Ok(msg)
    }
}

/// Load figures reported to a status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub rooms: u32,
    pub users: u32,
}

impl WireMessage for StatusReport {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        let mut p = Packet::with_tag(crate::tags::STATUS);
        p.add_u32(self.rooms)?;
        p.add_u32(self.users)?;
        Ok(p)
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        match packet.u8()? {
            crate::tags::STATUS => Ok(Self {
                rooms: packet.u32()?,
                users: packet.u32()?,
            }),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}
