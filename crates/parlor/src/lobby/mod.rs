//! The lobby server.
//!
//! Ties together the connection gate, the presence manager, the user
//! store and the room directory. Game servers reach the lobby on the same
//! port, as peer servers.

mod handler;
mod peer;
mod relay;

use std::net::SocketAddr;
use std::sync::Arc;

use parlor_protocol::{ConnectionKind, StatusReport};
use parlor_room::RoomDirectory;
use parlor_session::{PresenceManager, UserStore};
use parlor_transport::Listener;

use crate::gate;
use crate::{LobbyConfig, ParlorError};

/// Shared lobby state passed to each connection handler task.
pub(crate) struct LobbyState<S: UserStore> {
    pub(crate) config: LobbyConfig,
    pub(crate) store: S,
    pub(crate) presence: PresenceManager,
    pub(crate) directory: RoomDirectory,
}

/// A bound lobby server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyServer<S: UserStore> {
    listener: Listener,
    state: Arc<LobbyState<S>>,
}

impl<S: UserStore> LobbyServer<S> {
    /// Binds the configured address.
    ///
    /// # Errors
    /// Fails if the address can't be bound.
    pub async fn bind(config: LobbyConfig, store: S) -> Result<Self, ParlorError> {
        let listener = Listener::bind(config.bind).await?;
        let state = Arc::new(LobbyState {
            config,
            store,
            presence: PresenceManager::new(),
            directory: RoomDirectory::new(),
        });
        Ok(Self { listener, state })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ParlorError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParlorError> {
        tracing::info!(
            game_servers = self.state.config.game_servers.len(),
            "lobby running"
        );
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
                            rooms: gate::count(state.directory.len().await),
                            users: gate::count(state.presence.user_count().await),
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
