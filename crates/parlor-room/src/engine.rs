//! The room engine: every open room on a game server, one worker each.
//!
//! # Locking
//!
//! Two levels of lock, never nested:
//!
//! - the **registry** mutex guards only the `gid → session` map. It is held
//!   just long enough to insert, look up (cloning the `Arc`) or remove;
//! - each room's own mutex guards its [`Room`]. Every join, leave or rule
//!   change holds it for the whole operation.
//!
//! Callers look the session up, drop the registry guard, and only then
//! lock the room. Many connections joining many rooms can therefore never
//! deadlock against the per-room workers.
//!
//! # Workers
//!
//! Each room gets a task that sleeps on the room's [`Notify`]. Operations
//! that change something the worker cares about (owner arrived, room
//! ready, room closed) signal it after releasing the room lock. The worker
//! re-checks the phase under the lock after every wake-up, like a
//! condition-variable loop, so a spurious or stale signal is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_protocol::{Gid, RoomStatus, RuleSet};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{self, Instant};

use crate::{EngineConfig, JoinOutcome, PlayerSender, Room, RoomError, RoomInfo, RoomPhase};

/// Where the engine reports rooms starting and closing.
pub type StatusSender = mpsc::UnboundedSender<(Gid, RoomStatus)>;

/// One registered room and the wait/signal pair of its worker.
#[derive(Debug)]
struct RoomSession {
    gid: Gid,
    room: Mutex<Room>,
    signal: Notify,
}

#[derive(Debug)]
struct EngineInner {
    rooms: Mutex<HashMap<Gid, Arc<RoomSession>>>,
    config: EngineConfig,
    status: Option<StatusSender>,
}

/// Registry of open rooms.
///
/// Cheap to clone: clones share the same registry.
#[derive(Debug, Clone)]
pub struct RoomEngine {
    inner: Arc<EngineInner>,
}

impl RoomEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), also reporting every room's start and
    /// close on `status`.
    pub fn with_status_reports(config: EngineConfig, status: StatusSender) -> Self {
        Self::build(config, Some(status))
    }

    fn build(config: EngineConfig, status: Option<StatusSender>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                rooms: Mutex::new(HashMap::new()),
                config,
                status,
            }),
        }
    }

    /// Registers a room and starts its worker, which closes the room if
    /// the owner doesn't join within the configured timeout.
    pub async fn open_room(&self, gid: Gid, owner: &str, rules: RuleSet) -> Result<(), RoomError> {
        rules
            .validate()
            .map_err(|e| RoomError::InvalidRules(e.to_string()))?;
        let mut room = Room::new(gid, owner, rules);
        room.register()?;

        let session = Arc::new(RoomSession {
            gid,
            room: Mutex::new(room),
            signal: Notify::new(),
        });
        {
            let mut rooms = self.inner.rooms.lock().await;
            if rooms.contains_key(&gid) {
                return Err(RoomError::AlreadyExists(gid));
            }
            rooms.insert(gid, Arc::clone(&session));
        }

        tracing::info!(%gid, %owner, "room opened, waiting for owner");
        tokio::spawn(run_room(self.clone(), session));
        Ok(())
    }

    /// Deregisters a room and closes it if it is still live.
    ///
    /// Safe to call at any time, including after the worker has exited.
    /// Returns `false` if the room was not registered.
    pub async fn close_room(&self, gid: Gid) -> bool {
        let removed = self.inner.rooms.lock().await.remove(&gid);
        let Some(session) = removed else {
            return false;
        };
        session.room.lock().await.close("closed by the server");
        session.signal.notify_one();
        true
    }

    /// The one entry point through which connections take a seat.
    ///
    /// The room itself validates the join. If this was the owner's
    /// arrival, the worker's timeout is cancelled.
    pub async fn add_player_to_room(
        &self,
        gid: Gid,
        username: &str,
        password: Option<&str>,
        sender: PlayerSender,
    ) -> Result<JoinOutcome, RoomError> {
        let session = self.session(gid).await?;
        let outcome = session
            .room
            .lock()
            .await
            .add_player(username, password, sender)?;
        if outcome.owner_first {
            tracing::info!(%gid, %username, "owner joined");
        }
        session.signal.notify_one();
        Ok(outcome)
    }

    /// Frees `username`'s seat. Returns the vacated slot, or `None` if the
    /// room or the player is gone.
    pub async fn remove_player_from_room(&self, gid: Gid, username: &str) -> Option<usize> {
        let session = self.session(gid).await.ok()?;
        let slot = session.room.lock().await.remove_player(username);
        session.signal.notify_one();
        slot
    }

    pub async fn begin_game(&self, gid: Gid, requester: &str) -> Result<(), RoomError> {
        self.with_room(gid, |room| room.begin(requester)).await
    }

    pub async fn admit_player(&self, gid: Gid, requester: &str, slot: u8) -> Result<(), RoomError> {
        self.with_room(gid, |room| room.admit(requester, slot)).await
    }

    pub async fn update_rules(
        &self,
        gid: Gid,
        requester: &str,
        rules: RuleSet,
    ) -> Result<(), RoomError> {
        self.with_room(gid, |room| room.update_rules(requester, rules))
            .await
    }

    /// Marks a running game as complete.
    pub async fn finish_room(&self, gid: Gid) -> Result<(), RoomError> {
        self.with_room(gid, Room::finish).await
    }

    pub async fn room_info(&self, gid: Gid) -> Result<RoomInfo, RoomError> {
        let session = self.session(gid).await?;
        let info = session.room.lock().await.info();
        Ok(info)
    }

    pub async fn contains(&self, gid: Gid) -> bool {
        self.inner.rooms.lock().await.contains_key(&gid)
    }

    /// Number of registered rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }

    /// Number of humans seated across all rooms.
    pub async fn player_count(&self) -> usize {
        let sessions: Vec<_> = self.inner.rooms.lock().await.values().cloned().collect();
        let mut total = 0;
        for session in sessions {
            total += session.room.lock().await.human_count();
        }
        total
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Looks a room up without holding the registry lock afterwards.
    async fn session(&self, gid: Gid) -> Result<Arc<RoomSession>, RoomError> {
        self.inner
            .rooms
            .lock()
            .await
            .get(&gid)
            .cloned()
            .ok_or(RoomError::NotFound(gid))
    }

    /// Runs `f` under the room's lock, then wakes its worker.
    async fn with_room<T>(
        &self,
        gid: Gid,
        f: impl FnOnce(&mut Room) -> Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let session = self.session(gid).await?;
        let result = f(&mut *session.room.lock().await);
        session.signal.notify_one();
        result
    }

    fn report(&self, gid: Gid, status: RoomStatus) {
        if let Some(status_tx) = &self.inner.status {
            let _ = status_tx.send((gid, status));
        }
    }
}

/// The dedicated worker of one room.
async fn run_room(engine: RoomEngine, session: Arc<RoomSession>) {
    let gid = session.gid;
    let deadline = Instant::now() + engine.inner.config.owner_join_timeout;

    // WaitingForOwner: the only timed wait on room state.
    loop {
        if session.room.lock().await.phase() != RoomPhase::WaitingForOwner {
            break;
        }
        if time::timeout_at(deadline, session.signal.notified()).await.is_err() {
            let mut room = session.room.lock().await;
            // The owner may have arrived between the timeout and the lock.
            if room.phase() == RoomPhase::WaitingForOwner {
                tracing::info!(%gid, "owner did not join in time");
                room.close("the owner did not join in time");
            }
            break;
        }
    }

    // Populating / Ready / InProgress: wait for the next change.
    let mut rng = StdRng::from_os_rng();
    loop {
        {
            let mut room = session.room.lock().await;
            match room.phase() {
                RoomPhase::Closed => break,
                RoomPhase::Ready => {
                    if room.start(&mut rng).is_ok() {
                        engine.report(gid, RoomStatus::InProgress);
                    }
                }
                _ => {}
            }
        }
        session.signal.notified().await;
    }

    engine.close_room(gid).await;
    engine.report(gid, RoomStatus::Closed);
    tracing::debug!(%gid, "room worker finished");
}
