//! Per-connection handler for game clients.
//!
//! The flow is:
//!   1. Wait for a JoinGame the room accepts → take a seat
//!   2. Loop: receive room control requests → dispatch
//!   3. Free the seat
//!
//! A refused join is answered on the same connection and the client may
//! try again. Once seated, room broadcasts reach the player through the
//! outbox registered with the seat. When the room closes it also queues a
//! close, which ends the writer and, with it, this handler.

use std::sync::Arc;

use parlor_protocol::{GameEvent, GameRequest, Gid};
use parlor_room::{RoomEngine, RoomError};
use parlor_transport::{
    spawn_writer, Connection, ConnectionId, ConnectionReader, Outbound, Outbox, TransportError,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::GameState;
use crate::ParlorError;

/// Frees a player's seat when the handler is done with it.
///
/// The normal exit path calls [`SeatGuard::release`], so the seat is free
/// by the time the handler returns. If the handler unwinds instead, `Drop`
/// frees it from a spawned task.
struct SeatGuard {
    gid: Gid,
    username: String,
    engine: RoomEngine,
    released: bool,
}

impl SeatGuard {
    fn new(gid: Gid, username: String, engine: RoomEngine) -> Self {
        Self {
            gid,
            username,
            engine,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        leave(&self.engine, self.gid, &self.username).await;
    }
}

impl Drop for SeatGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let gid = self.gid;
        let username = std::mem::take(&mut self.username);
        let engine = self.engine.clone();
        tokio::spawn(async move { leave(&engine, gid, &username).await });
    }
}

async fn leave(engine: &RoomEngine, gid: Gid, username: &str) {
    if let Some(slot) = engine.remove_player_from_room(gid, username).await {
        tracing::info!(%gid, %username, slot, "player left");
    }
}

/// A seat the room has accepted, plus everything it queued for the player
/// before the writer task existed.
struct Seated {
    gid: Gid,
    username: String,
    outbox: Outbox<GameEvent>,
    queued: UnboundedReceiver<Outbound<GameEvent>>,
}

/// Handles a single game client from identification to close.
pub(crate) async fn handle_client(
    id: ConnectionId,
    stream: TcpStream,
    state: Arc<GameState>,
) -> Result<(), ParlorError> {
    let mut conn = Connection::new(id, stream, state.config.read_timeout());

    // --- Step 1: Join ---
    let Some(seated) = take_seat(&mut conn, &state.engine).await? else {
        return Ok(());
    };
    let Seated {
        gid,
        username,
        outbox,
        queued,
    } = seated;

    let (reader, writer) = conn.into_split();
    spawn_writer(writer, queued);
    let guard = SeatGuard::new(gid, username.clone(), state.engine.clone());

    // --- Step 2: Request loop ---
    let result = serve(reader, &outbox, &state.engine, gid, &username).await;
    let _ = outbox.send(Outbound::Close);

    // --- Step 3: Leave ---
    guard.release().await;
    result
}

/// Waits for a join the room accepts. Refusals are answered in place.
/// Returns `None` if the client went away or stayed silent for a whole
/// read timeout first.
async fn take_seat(
    conn: &mut Connection,
    engine: &RoomEngine,
) -> Result<Option<Seated>, ParlorError> {
    let id = conn.id();
    loop {
        let request = match conn.recv::<GameRequest>().await {
            Ok(request) => request,
            Err(TransportError::TimedOut | TransportError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let GameRequest::JoinGame {
            gid,
            username,
            password,
        } = request
        else {
            conn.send(&GameEvent::Notice {
                text: "join a room first".into(),
            })
            .await?;
            continue;
        };

        let (outbox, queued) = mpsc::unbounded_channel();
        let joined = engine
            .add_player_to_room(gid, &username, password.as_deref(), outbox.clone())
            .await;
        match joined {
            Ok(outcome) => {
                tracing::info!(%id, %gid, %username, slot = outcome.slot, "player seated");
                return Ok(Some(Seated {
                    gid,
                    username,
                    outbox,
                    queued,
                }));
            }
            Err(e) => {
                tracing::info!(%id, %gid, %username, error = %e, "join refused");
                conn.send(&GameEvent::Notice { text: e.to_string() }).await?;
            }
        }
    }
}

async fn serve(
    mut reader: ConnectionReader,
    outbox: &Outbox<GameEvent>,
    engine: &RoomEngine,
    gid: Gid,
    username: &str,
) -> Result<(), ParlorError> {
    loop {
        let request = match reader.recv::<GameRequest>().await {
            Ok(request) => request,
            // A closed outbox means the room let go of us.
            Err(TransportError::TimedOut) if !outbox.is_closed() => continue,
            Err(TransportError::TimedOut | TransportError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let result = match request {
            GameRequest::JoinGame { .. } => Err(RoomError::AlreadyInRoom {
                username: username.to_string(),
                gid,
            }),
            GameRequest::BeginGame => engine.begin_game(gid, username).await,
            GameRequest::AdmitPlayer { slot } => engine.admit_player(gid, username, slot).await,
            GameRequest::UpdateRules { rules } => engine.update_rules(gid, username, rules).await,
        };

        if let Err(e) = result {
            tracing::debug!(%gid, %username, error = %e, "request refused");
            reply(outbox, GameEvent::Notice { text: e.to_string() });
        }
    }
}

fn reply(outbox: &Outbox<GameEvent>, event: GameEvent) {
    let _ = outbox.send(Outbound::Send(event));
}
