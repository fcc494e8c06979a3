//! Room lifecycle management for Parlor.
//!
//! A room has two lives. On the lobby it is a directory entry: who owns
//! it, who may join, which game server hosts it. On the game server it is
//! a live session with four seats, run by a dedicated worker task.
//!
//! # Key types
//!
//! - [`Room`]: the per-room state machine: slots, rules, admission, turn
//!   order
//! - [`RoomPhase`]: lifecycle states and their legal transitions
//! - [`Player`]: a slot's occupant, human or computer
//! - [`RoomEngine`]: the game server's registry of open rooms, one worker
//!   per room
//! - [`RoomDirectory`]: the lobby's view of every room it brokered

mod config;
mod directory;
mod engine;
mod error;
mod player;
mod room;
mod turn;

pub use config::{EngineConfig, RoomPhase};
pub use directory::{LobbyRoom, RoomDirectory};
pub use engine::{RoomEngine, StatusSender};
pub use error::RoomError;
pub use player::{Human, Player, PlayerSender};
pub use room::{JoinOutcome, Room, RoomInfo};
pub use turn::{draw_turn_order, TURN_ORDERS};
