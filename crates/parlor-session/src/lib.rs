//! Lobby-side user management for Parlor.
//!
//! This crate handles who is online in the lobby and where user data
//! comes from:
//!
//! 1. **Data access**: the [`UserStore`] trait is the narrow interface the
//!    lobby needs from a user database (credentials, profile, statistics,
//!    friend and blocked lists). [`MemoryStore`] implements it in memory,
//!    seeded from configured [`Account`]s.
//! 2. **Presence**: [`PresenceManager`] is the authoritative map of
//!    connected [`User`]s. It fans out login, logout and chat
//!    notifications.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby server (above)   ← authenticates through UserStore, registers Users
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Transport / Protocol (below)  ← Outbox queues, LobbyEvent messages
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod presence;
mod store;
mod user;

pub use error::{SessionError, StoreError};
pub use presence::PresenceManager;
pub use store::{Account, MemoryStore, UserStore};
pub use user::User;
