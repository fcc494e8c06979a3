//! The game server.
//!
//! Hosts the rooms the lobby asks for. Players arrive as clients after the
//! lobby redirected them; the lobby itself arrives as a peer server.

mod handler;
mod peer;

use std::net::SocketAddr;
use std::sync::Arc;

use parlor_protocol::{ConnectionKind, StatusReport};
use parlor_room::{EngineConfig, RoomEngine};
use parlor_transport::Listener;
use tokio::sync::mpsc;

use crate::gate;
use crate::{GameConfig, ParlorError};

/// Shared game-server state passed to each connection handler task.
pub(crate) struct GameState {
    pub(crate) config: GameConfig,
    pub(crate) engine: RoomEngine,
}

/// A bound game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GameServer {
    listener: Listener,
    state: Arc<GameState>,
}

impl GameServer {
    /// Binds the configured address. Rooms starting and closing are
    /// reported to the configured lobby from here on.
    ///
    /// # Errors
    /// Fails if the address can't be bound.
    pub async fn bind(config: GameConfig) -> Result<Self, ParlorError> {
        let listener = Listener::bind(config.bind).await?;

        let engine_config = EngineConfig {
            owner_join_timeout: config.owner_join_timeout(),
        };
        let (reports, rx) = mpsc::unbounded_channel();
        tokio::spawn(peer::report_to_lobby(config.lobby, rx, config.server_timeout()));
        let engine = RoomEngine::with_status_reports(engine_config, reports);

        let state = Arc::new(GameState { config, engine });
        Ok(Self { listener, state })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ParlorError> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle on the hosted rooms.
    pub fn engine(&self) -> RoomEngine {
        self.state.engine.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParlorError> {
        tracing::info!(lobby = %self.state.config.lobby, "game server running");
        let identify_timeout = self.state.config.identify_timeout();
        let state = self.state;

        gate::run(self.listener, identify_timeout, move |id, kind, stream| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let result = match kind {
                    ConnectionKind::Client => handler::handle_client(id, stream, state).await,
                    ConnectionKind::PeerServer => peer::handle_peer(id, stream, state).await,
                    ConnectionKind::Status => {
                        let report = StatusReport {
                            rooms: gate::count(state.engine.room_count().await),
                            users: gate::count(state.engine.player_count().await),
                        };
                        gate::answer_status(id, stream, report).await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(%id, error = %e, "connection ended with error");
                }
            });
        })
        .await
    }
}
