//! One-byte message tags, grouped by subsystem.
//!
//! The first payload byte of every packet is one of these. Tags are only
//! unique within a namespace: the [`peer`] tags reuse `0x00`/`0x01` because
//! they only ever appear on a peer-server connection, which is identified
//! before any packet is parsed.

/// Connection-type header: the single raw byte a peer sends immediately
/// after connecting, before any packet.
pub mod connection {
    /// A player (lobby client or game client).
    pub const CLIENT: u8 = 0x00;
    /// Another server forwarding control messages.
    pub const PEER_SERVER: u8 = 0x01;
    /// A one-shot status probe. Answered with a [`STATUS`] packet.
    pub const STATUS: u8 = 0x02;
}

/// Authentication.
pub mod auth {
    pub const LOGIN: u8 = 0xA0;
    pub const LOGIN_ACCEPTED: u8 = 0xA1;
    pub const LOGIN_REJECTED: u8 = 0xA2;
    pub const LOGOUT: u8 = 0xA3;
    pub const LOGGED_OUT: u8 = 0xA4;
}

/// Lobby actions and lobby notifications.
pub mod lobby {
    pub const USER_ONLINE: u8 = 0xB0;
    pub const USER_OFFLINE: u8 = 0xB1;
    pub const CHAT_SEND: u8 = 0xB2;
    pub const CHAT_MESSAGE: u8 = 0xB3;
    pub const CREATE_ROOM: u8 = 0xB4;
    pub const ROOM_CREATED: u8 = 0xB5;
    pub const JOIN_ROOM: u8 = 0xB6;
    pub const JOIN_REDIRECT: u8 = 0xB7;
    pub const LIST_ROOMS: u8 = 0xB8;
    pub const ROOM_LIST: u8 = 0xB9;
    pub const GET_STATISTICS: u8 = 0xBA;
    pub const STATISTICS: u8 = 0xBB;
    pub const GET_PROFILE: u8 = 0xBC;
    pub const PROFILE: u8 = 0xBD;
    pub const UPDATE_PROFILE: u8 = 0xBE;
    pub const UPDATE_LIST: u8 = 0xBF;
}

/// Room control, sent by a game client to a game server.
pub mod room {
    pub const JOIN_GAME: u8 = 0xC0;
    pub const BEGIN_GAME: u8 = 0xC1;
}

/// Game session traffic.
pub mod game {
    pub const PLAYER_JOINED: u8 = 0xD0;
    pub const PLAYER_LEFT: u8 = 0xD1;
    pub const TURN_ORDER: u8 = 0xD2;
    /// Client → server: admit a slot. Server → client: a slot was admitted.
    pub const ADMIT_PLAYER: u8 = 0xD3;
    /// Client → server: replace the rules. Server → client: rules changed.
    pub const RULES: u8 = 0xD4;
}

/// Server-originated text messages.
pub mod server {
    /// Human-readable notice, including validation failures.
    pub const NOTICE: u8 = 0xE1;
    /// Generic "something went wrong on our side".
    pub const SERVER_ERROR: u8 = 0xE2;
}

/// Inter-server control, only valid on a peer-server connection.
pub mod peer {
    pub const OPEN_ROOM: u8 = 0x00;
    pub const ROOM_OPENED: u8 = 0x01;
    /// Game server → lobby: a room started or closed.
    pub const ROOM_STATUS: u8 = 0x02;
}

/// Status probe reply (connection-type namespace).
pub const STATUS: u8 = connection::STATUS;
