//! Lobby ↔ game server control, game-server side.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{ConnectionKind, Gid, PeerMessage, RoomStatus};
use parlor_transport::{Connection, ConnectionId, TransportError};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;

use super::GameState;
use crate::ParlorError;

/// Serves `OpenRoom` requests from the lobby until it hangs up.
pub(crate) async fn handle_peer(
    id: ConnectionId,
    stream: TcpStream,
    state: Arc<GameState>,
) -> Result<(), ParlorError> {
    let mut conn = Connection::new(id, stream, state.config.read_timeout());

    loop {
        let message = match conn.recv::<PeerMessage>().await {
            Ok(message) => message,
            Err(TransportError::TimedOut) => continue,
            Err(TransportError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let (gid, owner, rules) = match message {
            PeerMessage::OpenRoom { gid, owner, rules } => (gid, owner, rules),
            other => {
                tracing::debug!(%id, message = ?other, "ignoring unexpected peer message");
                continue;
            }
        };

        let reply = match state.engine.open_room(gid, &owner, rules).await {
            Ok(()) => PeerMessage::RoomOpened {
                gid,
                accepted: true,
                reason: String::new(),
            },
            Err(e) => {
                tracing::warn!(%gid, %owner, error = %e, "refused to open room");
                PeerMessage::RoomOpened {
                    gid,
                    accepted: false,
                    reason: e.to_string(),
                }
            }
        };
        conn.send(&reply).await?;
    }
}

/// Pause between attempts while the lobby can't be reached.
const REPORT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Forwards the engine's room status changes to the lobby, in order.
///
/// Keeps one peer connection open. A report that can't be delivered stays
/// at the head of the queue and is retried until the lobby takes it;
/// the lobby only forgets a room once it hears that the room closed.
pub(crate) async fn report_to_lobby(
    lobby: SocketAddr,
    mut reports: UnboundedReceiver<(Gid, RoomStatus)>,
    timeout: Duration,
) {
    let mut conn: Option<Connection> = None;

    while let Some((gid, status)) = reports.recv().await {
        let message = PeerMessage::RoomStatus { gid, status };
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if conn.is_none() {
                conn = connect(lobby, timeout).await;
            }
            let sent = match conn.as_mut() {
                Some(open) => match open.send(&message).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(%lobby, error = %e, "lost lobby connection");
                        conn = None;
                        false
                    }
                },
                None => false,
            };
            if sent {
                break;
            }
            // The first retry is immediate: a stale connection just needs
            // replacing.
            if attempts == 1 {
                continue;
            }
            if attempts == 2 {
                tracing::warn!(%lobby, %gid, ?status, "lobby unreachable, holding room status report");
            }
            time::sleep(REPORT_RETRY_DELAY).await;
        }

        if attempts > 2 {
            tracing::info!(%lobby, %gid, ?status, attempts, "delivered held room status report");
        }
    }
}

async fn connect(lobby: SocketAddr, timeout: Duration) -> Option<Connection> {
    match time::timeout(
        timeout,
        Connection::connect(lobby, ConnectionKind::PeerServer, timeout),
    )
    .await
    {
        Ok(Ok(conn)) => Some(conn),
        Ok(Err(e)) => {
            tracing::debug!(%lobby, error = %e, "can't reach lobby");
            None
        }
        Err(_) => {
            tracing::debug!(%lobby, "timed out connecting to lobby");
            None
        }
    }
}
