//! Game servers reporting back to the lobby.

use std::sync::Arc;

use parlor_protocol::PeerMessage;
use parlor_session::UserStore;
use parlor_transport::{Connection, ConnectionId, TransportError};
use tokio::net::TcpStream;

use super::LobbyState;
use crate::ParlorError;

/// Applies room status reports until the game server hangs up.
pub(crate) async fn handle_peer<S: UserStore>(
    id: ConnectionId,
    stream: TcpStream,
    state: Arc<LobbyState<S>>,
) -> Result<(), ParlorError> {
    let mut conn = Connection::new(id, stream, state.config.read_timeout());
    tracing::debug!(%id, peer = ?conn.peer_addr(), "game server connected");

    loop {
        match conn.recv::<PeerMessage>().await {
            Ok(PeerMessage::RoomStatus { gid, status }) => {
                tracing::debug!(%id, %gid, ?status, "room status report");
                state.directory.set_status(gid, status).await;
            }
            Ok(other) => {
                tracing::debug!(%id, message = ?other, "ignoring unexpected peer message");
            }
            Err(TransportError::TimedOut) => continue,
            Err(TransportError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}
