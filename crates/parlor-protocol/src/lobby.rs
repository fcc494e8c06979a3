//! Messages between a lobby client and the lobby server.

use crate::tags::{auth, lobby, server};
use crate::{
    Gid, ListAction, ListKind, Packet, Profile, ProtocolError, RoomListEntry,
    Statistics, Visibility, WireMessage,
};

/// Client → lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyRequest {
    /// Must be the first packet on a lobby connection.
    Login { username: String, password: String },
    Logout,
    Chat { text: String },
    /// Ask the lobby to open a room with default rules.
    CreateRoom {
        visibility: Visibility,
        password: Option<String>,
        friends_only: bool,
    },
    JoinRoom { gid: Gid, password: Option<String> },
    ListRooms,
    GetStatistics { username: String },
    GetProfile { username: String },
    UpdateProfile { email: Option<String> },
    UpdateList {
        kind: ListKind,
        action: ListAction,
        username: String,
    },
}

/// Lobby → client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    LoginAccepted { username: String },
    LoginRejected { reason: String },
    LoggedOut,
    UserOnline { username: String },
    UserOffline { username: String },
    ChatMessage { sender: String, text: String },
    /// The room is open on a game server; the owner should connect there.
    RoomCreated { gid: Gid, host: String, port: u16 },
    /// The join was accepted; connect to the hosting game server.
    JoinRedirect { gid: Gid, host: String, port: u16 },
    RoomList { rooms: Vec<RoomListEntry> },
    Statistics { username: String, stats: Statistics },
    Profile { profile: Profile },
    /// A readable message: confirmations and validation failures.
    Notice { text: String },
    /// Something failed on the server's side.
    ServerError { text: String },
}

impl WireMessage for LobbyRequest {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        let packet = match self {
            Self::Login { username, password } => {
                let mut p = Packet::with_tag(auth::LOGIN);
                p.add_str(username)?;
                p.add_str(password)?;
                p
            }
            Self::Logout => Packet::with_tag(auth::LOGOUT),
            Self::Chat { text } => {
                let mut p = Packet::with_tag(lobby::CHAT_SEND);
                p.add_str(text)?;
                p
            }
            Self::CreateRoom {
                visibility,
                password,
                friends_only,
            } => {
                let mut p = Packet::with_tag(lobby::CREATE_ROOM);
                p.add_u8((*visibility).into())?;
                p.add_opt_str(password.as_deref())?;
                p.add_bool(*friends_only)?;
                p
            }
            Self::JoinRoom { gid, password } => {
                let mut p = Packet::with_tag(lobby::JOIN_ROOM);
                p.add_u32(gid.0)?;
                p.add_opt_str(password.as_deref())?;
                p
            }
            Self::ListRooms => Packet::with_tag(lobby::LIST_ROOMS),
            Self::GetStatistics { username } => {
                let mut p = Packet::with_tag(lobby::GET_STATISTICS);
                p.add_str(username)?;
                p
            }
            Self::GetProfile { username } => {
                let mut p = Packet::with_tag(lobby::GET_PROFILE);
                p.add_str(username)?;
                p
            }
            Self::UpdateProfile { email } => {
                let mut p = Packet::with_tag(lobby::UPDATE_PROFILE);
                p.add_opt_str(email.as_deref())?;
                p
            }
            Self::UpdateList {
                kind,
                action,
                username,
            } => {
                let mut p = Packet::with_tag(lobby::UPDATE_LIST);
                p.add_u8((*kind).into())?;
                p.add_u8((*action).into())?;
                p.add_str(username)?;
                p
            }
        };
        Ok(packet)
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let msg = match packet.u8()? {
            auth::LOGIN => Self::Login {
                username: packet.string()?,
                password: packet.string()?,
            },
            auth::LOGOUT => Self::Logout,
            lobby::CHAT_SEND => Self::Chat {
                text: packet.string()?,
            },
            lobby::CREATE_ROOM => Self::CreateRoom {
                visibility: packet.u8()?.try_into()?,
                password: packet.opt_string()?,
                friends_only: packet.bool()?,
            },
            lobby::JOIN_ROOM => Self::JoinRoom {
                gid: Gid(packet.u32()?),
                password: packet.opt_string()?,
            },
            lobby::LIST_ROOMS => Self::ListRooms,
            lobby::GET_STATISTICS => Self::GetStatistics {
                username: packet.string()?,
            },
            lobby::GET_PROFILE => Self::GetProfile {
                username: packet.string()?,
            },
            lobby::UPDATE_PROFILE => Self::UpdateProfile {
                email: packet.opt_string()?,
            },
            lobby::UPDATE_LIST => Self::UpdateList {
                kind: packet.u8()?.try_into()?,
                action: packet.u8()?.try_into()?,
                username: packet.string()?,
            },
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        Ok(msg)
    }
}

fn text_packet(tag: u8, text: &str) -> Result<Packet, ProtocolError> {
    let mut p = Packet::with_tag(tag);
    p.add_str(text)?;
    Ok(p)
}

fn redirect_packet(
    tag: u8,
    gid: Gid,
    host: &str,
    port: u16,
) -> Result<Packet, ProtocolError> {
    let mut p = Packet::with_tag(tag);
    p.add_u32(gid.0)?;
    p.add_str(host)?;
    p.add_u16(port)?;
    Ok(p)
}

impl WireMessage for LobbyEvent {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        match self {
            Self::LoginAccepted { username } => {
                text_packet(auth::LOGIN_ACCEPTED, username)
            }
            Self::LoginRejected { reason } => {
                text_packet(auth::LOGIN_REJECTED, reason)
            }
            Self::LoggedOut => Ok(Packet::with_tag(auth::LOGGED_OUT)),
            Self::UserOnline { username } => {
                text_packet(lobby::USER_ONLINE, username)
            }
            Self::UserOffline { username } => {
                text_packet(lobby::USER_OFFLINE, username)
            }
            Self::ChatMessage { sender, text } => {
                let mut p = Packet::with_tag(lobby::CHAT_MESSAGE);
                p.add_str(sender)?;
                p.add_str(text)?;
                Ok(p)
            }
            Self::RoomCreated { gid, host, port } => {
                redirect_packet(lobby::ROOM_CREATED, *gid, host, *port)
            }
            Self::JoinRedirect { gid, host, port } => {
                redirect_packet(lobby::JOIN_REDIRECT, *gid, host, *port)
            }
            Self::RoomList { rooms } => {
                let mut p = Packet::with_tag(lobby::ROOM_LIST);
                let count = u16::try_from(rooms.len()).map_err(|_| {
                    ProtocolError::InvalidValue("too many rooms".into())
                })?;
                p.add_u16(count)?;
                for room in rooms {
                    room.encode_into(&mut p)?;
                }
                Ok(p)
            }
            Self::Statistics { username, stats } => {
                let mut p = Packet::with_tag(lobby::STATISTICS);
                p.add_str(username)?;
                stats.encode_into(&mut p)?;
                Ok(p)
            }
            Self::Profile { profile } => {
                let mut p = Packet::with_tag(lobby::PROFILE);
                p.add_str(&profile.username)?;
                p.add_opt_str(profile.email.as_deref())?;
                Ok(p)
            }
            Self::Notice { text } => text_packet(server::NOTICE, text),
            Self::ServerError { text } => {
                text_packet(server::SERVER_ERROR, text)
            }
        }
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let msg = match packet.u8()? {
            auth::LOGIN_ACCEPTED => Self::LoginAccepted {
                username: packet.string()?,
            },
            auth::LOGIN_REJECTED => Self::LoginRejected {
                reason: packet.string()?,
            },
            auth::LOGGED_OUT => Self::LoggedOut,
            lobby::USER_ONLINE => Self::UserOnline {
                username: packet.string()?,
            },
            lobby::USER_OFFLINE => Self::UserOffline {
                username: packet.string()?,
            },
            lobby::CHAT_MESSAGE => Self::ChatMessage {
                sender: packet.string()?,
                text: packet.string()?,
            },
            lobby::ROOM_CREATED => Self::RoomCreated {
                gid: Gid(packet.u32()?),
                host: packet.string()?,
                port: packet.u16()?,
            },
            lobby::JOIN_REDIRECT => Self::JoinRedirect {
                gid: Gid(packet.u32()?),
                host: packet.string()?,
                port: packet.u16()?,
            },
            lobby::ROOM_LIST => {
                let count = packet.u16()?;
                let mut rooms = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    rooms.push(RoomListEntry::decode_from(packet)?);
                }
                Self::RoomList { rooms }
            }
            lobby::STATISTICS => Self::Statistics {
                username: packet.string()?,
                stats: Statistics::decode_from(packet)?,
            },
            lobby::PROFILE => Self::Profile {
                profile: Profile {
                    username: packet.string()?,
                    email: packet.opt_string()?,
                },
            },
            server::NOTICE => Self::Notice {
                text: packet.string()?,
            },
            server::SERVER_ERROR => Self::ServerError {
                text: packet.string()?,
            },
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        Ok(msg)
    }
}
