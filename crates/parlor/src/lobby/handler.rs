//! Per-connection handler for lobby clients.
//!
//! Each identified client connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Wait for Login → authenticate against the user store
//!   2. Register with the presence manager → user is online
//!   3. Loop: receive requests → dispatch
//!   4. Take the user offline and close their rooms, then say goodbye
//!
//! Everything addressed to the user goes through their outbox, so replies
//! and presence notifications can't interleave mid-packet. A client that
//! has seen `LoggedOut` may log in again at once.

use std::sync::Arc;

use parlor_protocol::{LobbyEvent, LobbyRequest};
use parlor_session::{Account, User, UserStore};
use parlor_transport::{
    spawn_writer, Connection, ConnectionId, ConnectionReader, Outbound, Outbox, TransportError,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::relay;
use super::LobbyState;
use crate::{ParlorError, SERVER_ERROR_TEXT};

/// Takes a user offline when the handler is done with them.
///
/// The normal exit path calls [`PresenceGuard::release`]. If the handler
/// panics instead, `Drop` runs the same cleanup in a spawned task.
struct PresenceGuard<S: UserStore> {
    username: String,
    state: Arc<LobbyState<S>>,
    released: bool,
}

impl<S: UserStore> PresenceGuard<S> {
    fn new(username: String, state: Arc<LobbyState<S>>) -> Self {
        Self {
            username,
            state,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        go_offline(&self.state, &self.username).await;
    }
}

impl<S: UserStore> Drop for PresenceGuard<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let username = std::mem::take(&mut self.username);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move { go_offline(&state, &username).await });
    }
}

async fn go_offline<S: UserStore>(state: &LobbyState<S>, username: &str) {
    let _ = state.presence.remove_user(username).await;
    let closed = state.directory.close_owned_by(username).await;
    if !closed.is_empty() {
        tracing::info!(%username, rooms = closed.len(), "closed rooms of departed owner");
    }
}

/// Handles a single lobby client from identification to close.
pub(crate) async fn handle_client<S: UserStore>(
    id: ConnectionId,
    stream: TcpStream,
    state: Arc<LobbyState<S>>,
) -> Result<(), ParlorError> {
    let mut conn = Connection::new(id, stream, state.config.read_timeout());

    // --- Step 1: Login ---
    let Some(account) = log_in(&mut conn, &state).await? else {
        return Ok(());
    };
    let username = account.username.clone();

    let (reader, writer) = conn.into_split();
    let (outbox, rx) = mpsc::unbounded_channel();
    spawn_writer(writer, rx);

    // --- Step 2: Presence ---
    if let Err(e) = state.presence.add_user(User::new(account, outbox.clone())).await {
        tracing::info!(%id, %username, error = %e, "login rejected");
        reply(&outbox, LobbyEvent::LoginRejected { reason: e.to_string() });
        let _ = outbox.send(Outbound::Close);
        return Ok(());
    }
    let guard = PresenceGuard::new(username.clone(), Arc::clone(&state));
    tracing::info!(%id, %username, "login accepted");

    // --- Step 3: Request loop ---
    let result = serve(reader, &outbox, &state, &username).await;

    // --- Step 4: Leave ---
    guard.release().await;
    if matches!(result, Ok(Exit::LoggedOut)) {
        reply(&outbox, LobbyEvent::LoggedOut);
    }
    let _ = outbox.send(Outbound::Close);
    result.map(|_| ())
}

/// Why the request loop ended without an error.
enum Exit {
    LoggedOut,
    Disconnected,
}

/// Waits for a successful login. Returns `None` if the client went away
/// or stayed silent for a whole read timeout first.
async fn log_in<S: UserStore>(
    conn: &mut Connection,
    state: &LobbyState<S>,
) -> Result<Option<Account>, ParlorError> {
    let id = conn.id();
    loop {
        let request = match conn.recv::<LobbyRequest>().await {
            Ok(request) => request,
            Err(TransportError::TimedOut) => {
                tracing::debug!(%id, "no login before the read timeout");
                return Ok(None);
            }
            Err(TransportError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let LobbyRequest::Login { username, password } = request else {
            conn.send(&LobbyEvent::Notice {
                text: "log in first".into(),
            })
            .await?;
            continue;
        };

        match state.store.authenticate(&username, &password).await {
            Ok(true) => return Ok(Some(state.store.account(&username).await?)),
            Ok(false) => {
                tracing::info!(%id, %username, "login rejected: bad credentials");
                conn.send(&LobbyEvent::LoginRejected {
                    reason: "wrong username or password".into(),
                })
                .await?;
            }
            Err(e) => {
                tracing::error!(%id, %username, error = %e, "user store failed during login");
                conn.send(&LobbyEvent::ServerError {
                    text: SERVER_ERROR_TEXT.into(),
                })
                .await?;
            }
        }
    }
}

async fn serve<S: UserStore>(
    mut reader: ConnectionReader,
    outbox: &Outbox<LobbyEvent>,
    state: &LobbyState<S>,
    username: &str,
) -> Result<Exit, ParlorError> {
    loop {
        let request = match reader.recv::<LobbyRequest>().await {
            Ok(request) => request,
            // Idle lobby users are fine; only a dead writer ends the session.
            Err(TransportError::TimedOut) if !outbox.is_closed() => continue,
            Err(TransportError::TimedOut) => return Ok(Exit::Disconnected),
            Err(TransportError::ConnectionClosed) => {
                tracing::info!(%username, "connection closed");
                return Ok(Exit::Disconnected);
            }
            Err(e) => return Err(e.into()),
        };

        match handle_request(outbox, state, username, request).await {
            Ok(true) => return Ok(Exit::LoggedOut),
            Ok(false) => {}
            Err(e) => reply(outbox, failure_event(username, &e)),
        }
    }
}

/// Handles one request. Returns `true` once the user has logged out.
async fn handle_request<S: UserStore>(
    outbox: &Outbox<LobbyEvent>,
    state: &LobbyState<S>,
    username: &str,
    request: LobbyRequest,
) -> Result<bool, ParlorError> {
    match request {
        LobbyRequest::Login { .. } => reply(
            outbox,
            LobbyEvent::Notice {
                text: "you are already logged in".into(),
            },
        ),

        LobbyRequest::Logout => {
            tracing::info!(%username, "logged out");
            return Ok(true);
        }

        LobbyRequest::Chat { text } => {
            state.presence.broadcast_chat(username, &text).await?;
        }

        LobbyRequest::CreateRoom {
            visibility,
            password,
            friends_only,
        } => {
            let created =
                relay::create_room(state, username, visibility, password, friends_only).await?;
            reply(outbox, created);
        }

        LobbyRequest::JoinRoom { gid, password } => {
            let room = state.directory.get(gid).await?;
            let owner = state.store.account(&room.owner).await?;
            let host = state
                .directory
                .join(gid, username, password.as_deref(), &owner.friends, &owner.blocked)
                .await?;
            tracing::info!(%gid, %username, %host, "redirecting to game server");
            reply(
                outbox,
                LobbyEvent::JoinRedirect {
                    gid,
                    host: host.ip().to_string(),
                    port: host.port(),
                },
            );
        }

        LobbyRequest::ListRooms => {
            let rooms = state.directory.list_open().await;
            reply(outbox, LobbyEvent::RoomList { rooms });
        }

        LobbyRequest::GetStatistics { username: target } => {
            let stats = state.store.statistics(&target).await?;
            reply(
                outbox,
                LobbyEvent::Statistics {
                    username: target,
                    stats,
                },
            );
        }

        LobbyRequest::GetProfile { username: target } => {
            let profile = state.store.profile(&target).await?;
            reply(outbox, LobbyEvent::Profile { profile });
        }

        LobbyRequest::UpdateProfile { email } => {
            state.store.update_profile(username, email).await?;
            reply(
                outbox,
                LobbyEvent::Notice {
                    text: "profile updated".into(),
                },
            );
        }

        LobbyRequest::UpdateList {
            kind,
            action,
            username: target,
        } => {
            state.store.update_list(username, kind, action, &target).await?;
            state
                .presence
                .apply_list_change(username, kind, action, &target)
                .await?;
            reply(
                outbox,
                LobbyEvent::Notice {
                    text: "list updated".into(),
                },
            );
        }
    }

    Ok(false)
}

/// Turns a failed request into what the client gets to see.
fn failure_event(username: &str, e: &ParlorError) -> LobbyEvent {
    if e.is_validation() {
        tracing::debug!(%username, error = %e, "request refused");
        LobbyEvent::Notice { text: e.to_string() }
    } else {
        tracing::error!(%username, error = %e, "request failed");
        LobbyEvent::ServerError {
            text: SERVER_ERROR_TEXT.into(),
        }
    }
}

fn reply(outbox: &Outbox<LobbyEvent>, event: LobbyEvent) {
    let _ = outbox.send(Outbound::Send(event));
}
