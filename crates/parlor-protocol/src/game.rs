//! Messages between a game client and a game server.

use crate::tags::{game, room, server};
use crate::{Gid, Packet, ProtocolError, RuleSet, WireMessage, SLOT_COUNT};

/// Client → game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRequest {
    /// Take a seat in room `gid`. Must be the first packet on a game
    /// connection.
    JoinGame {
        gid: Gid,
        username: String,
        password: Option<String>,
    },
    /// Owner only: start with whoever has been admitted.
    BeginGame,
    /// Owner only: let the human in `slot` take part.
    AdmitPlayer { slot: u8 },
    /// Owner only, before the game starts.
    UpdateRules { rules: RuleSet },
}

/// Game server → client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoined {
        slot: u8,
        username: String,
        owner: bool,
        admitted: bool,
    },
    PlayerLeft { slot: u8, username: String },
    /// The game has started. Seats are listed in turn order.
    TurnOrder { seats: Vec<Seat> },
    PlayerAdmitted { slot: u8 },
    RulesChanged { rules: RuleSet },
    Notice { text: String },
    ServerError { text: String },
}

/// One entry of the turn order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Slot index, `0..SLOT_COUNT`.
    pub slot: u8,
    pub name: String,
    pub computer: bool,
}

impl WireMessage for GameRequest {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        let packet = match self {
            Self::JoinGame {
                gid,
                username,
                password,
            } => {
                let mut p = Packet::with_tag(room::JOIN_GAME);
                p.add_u32(gid.0)?;
                p.add_str(username)?;
                p.add_opt_str(password.as_deref())?;
                p
            }
            Self::BeginGame => Packet::with_tag(room::BEGIN_GAME),
            Self::AdmitPlayer { slot } => {
                let mut p = Packet::with_tag(game::ADMIT_PLAYER);
                p.add_u8(*slot)?;
                p
            }
            Self::UpdateRules { rules } => {
                let mut p = Packet::with_tag(game::RULES);
                rules.encode_into(&mut p)?;
                p
            }
        };
        Ok(packet)
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let msg = match packet.u8()? {
            room::JOIN_GAME => Self::JoinGame {
                gid: Gid(packet.u32()?),
                username: packet.string()?,
                password: packet.opt_string()?,
            },
            room::BEGIN_GAME => Self::BeginGame,
            game::ADMIT_PLAYER => Self::AdmitPlayer { slot: packet.u8()? },
            game::RULES => Self::UpdateRules {
                rules: RuleSet::decode_from(packet)?,
            },
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        Ok(msg)
    }
}

impl WireMessage for GameEvent {
    fn encode(&self) -> Result<Packet, ProtocolError> {
        let packet = match self {
            Self::PlayerJoined {
                slot,
                username,
                owner,
                admitted,
            } => {
                let mut p = Packet::with_tag(game::PLAYER_JOINED);
                p.add_u8(*slot)?;
                p.add_str(username)?;
                p.add_bool(*owner)?;
                p.add_bool(*admitted)?;
                p
            }
            Self::PlayerLeft { slot, username } => {
                let mut p = Packet::with_tag(game::PLAYER_LEFT);
                p.add_u8(*slot)?;
                p.add_str(username)?;
                p
            }
            Self::TurnOrder { seats } => {
                if seats.len() != SLOT_COUNT {
                    return Err(ProtocolError::InvalidValue(format!(
                        "turn order needs {SLOT_COUNT} seats, got {}",
                        seats.len()
                    )));
                }
                let mut p = Packet::with_tag(game::TURN_ORDER);
                for seat in seats {
                    p.add_u8(seat.slot)?;
                    p.add_str(&seat.name)?;
                    p.add_bool(seat.computer)?;
                }
                p
            }
            Self::PlayerAdmitted { slot } => {
                let mut p = Packet::with_tag(game::ADMIT_PLAYER);
                p.add_u8(*slot)?;
                p
            }
            Self::RulesChanged { rules } => {
                let mut p = Packet::with_tag(game::RULES);
                rules.encode_into(&mut p)?;
                p
            }
            Self::Notice { text } => {
                let mut p = Packet::with_tag(server::NOTICE);
                p.add_str(text)?;
                p
            }
            Self::ServerError { text } => {
                let mut p = Packet::with_tag(server::SERVER_ERROR);
                p.add_str(text)?;
                p
            }
        };
        Ok(packet)
    }

    fn decode(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let msg = match packet.u8()? {
            game::PLAYER_JOINED => Self::PlayerJoined {
                slot: packet.u8()?,
                username: packet.string()?,
                owner: packet.bool()?,
                admitted: packet.bool()?,
            },
            game::PLAYER_LEFT => Self::PlayerLeft {
                slot: packet.u8()?,
                username: packet.string()?,
            },
            game::TURN_ORDER => {
                let mut seats = Vec::with_capacity(SLOT_COUNT);
                for _ in 0..SLOT_COUNT {
                    let slot = packet.u8()?;
                    if usize::from(slot) >= SLOT_COUNT {
                        return Err(ProtocolError::InvalidValue(format!(
                            "seat slot {slot} out of range"
                        )));
                    }
                    seats.push(Seat {
                        slot,
                        name: packet.string()?,
                        computer: packet.bool()?,
                    });
                }
                Self::TurnOrder { seats }
            }
            game::ADMIT_PLAYER => Self::PlayerAdmitted { slot: packet.u8()? },
            game::RULES => Self::RulesChanged {
                rules: RuleSet::decode_from(packet)?,
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
