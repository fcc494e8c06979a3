//! # Parlor
//!
//! Lobby and game servers for a four-seat networked board game.
//!
//! A deployment runs one **lobby** and a pool of **game servers**. Players
//! log in to the lobby, chat, and create or join rooms. The lobby doesn't
//! host rooms itself: it picks the least loaded game server, asks it to
//! open the room, and redirects players there.
//!
//! ```text
//!  client ──login/chat/create──▶ lobby ──OpenRoom──▶ game server
//!     │                            ◀──RoomStatus──        ▲
//!     └────────────── JoinGame (after redirect) ──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parlor::{LobbyConfig, LobbyServer, MemoryStore};
//!
//! # async fn run() -> Result<(), parlor::ParlorError> {
//! let mut config = LobbyConfig::load("lobby.json")?;
//! let store = MemoryStore::new(std::mem::take(&mut config.accounts));
//! let server = LobbyServer::bind(config, store).await?;
//! server.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod gate;
mod game;
mod lobby;

pub use client::{probe_status, Client, GameClient, LobbyClient};
pub use config::{ConfigError, GameConfig, GameServerEntry, LobbyConfig};
pub use error::ParlorError;
pub use game::GameServer;
pub use lobby::LobbyServer;
pub use parlor_session::{Account, MemoryStore, UserStore};

/// What a client sees when something failed on our side.
pub const SERVER_ERROR_TEXT: &str = "server error";
