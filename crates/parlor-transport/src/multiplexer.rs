//! Waiting on many sockets at once.
//!
//! A [`SocketMultiplexer`] watches a dynamic set of TCP streams and
//! returns from [`poll`](SocketMultiplexer::poll) when one of them has
//! data, when an optional one-shot deadline passes, or when another task
//! calls [`Interrupter::awake`]. Readiness comes from the runtime's
//! reactor, so nothing busy-polls.
//!
//! The multiplexer is owned by one task. The only handle that may be used
//! from elsewhere is the [`Interrupter`].

use std::collections::HashMap;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::ConnectionId;

/// Why [`SocketMultiplexer::poll`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// Nothing happened: woken by [`Interrupter::awake`], or the wait
    /// failed transiently. Call `poll` again.
    NoAction,
    /// The deadline set by
    /// [`set_expire_time`](SocketMultiplexer::set_expire_time) passed.
    TimeExpired,
    /// At least one socket is readable; see
    /// [`ready_sockets`](SocketMultiplexer::ready_sockets).
    DataReady,
}

/// Wakes a task blocked in [`SocketMultiplexer::poll`].
///
/// Cheap to clone and safe to use from any task. An `awake` that happens
/// while nobody is polling is remembered, so the next `poll` returns
/// immediately instead of missing it.
#[derive(Debug, Clone)]
pub struct Interrupter(Arc<Notify>);

impl Interrupter {
    pub fn awake(&self) {
        self.0.notify_one();
    }
}

/// Watches a set of sockets for readability.
#[derive(Debug)]
pub struct SocketMultiplexer {
    sockets: HashMap<ConnectionId, TcpStream>,
    ready: Vec<ConnectionId>,
    deadline: Option<Instant>,
    interrupt: Arc<Notify>,
}

impl Default for SocketMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketMultiplexer {
    pub fn new() -> Self {
        Self {
            sockets: HashMap::new(),
            ready: Vec::new(),
            deadline: None,
            interrupt: Arc::new(Notify::new()),
        }
    }

    /// A handle other tasks can use to interrupt `poll`.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter(Arc::clone(&self.interrupt))
    }

    /// Starts watching `socket`. Replaces any socket already under `id`.
    pub fn add_socket(&mut self, id: ConnectionId, socket: TcpStream) {
        self.sockets.insert(id, socket);
    }

    /// Stops watching `id` and closes the socket.
    pub fn remove_socket(&mut self, id: ConnectionId) -> bool {
        self.ready.retain(|r| *r != id);
        self.sockets.remove(&id).is_some()
    }

    /// Stops watching `id` and hands the socket back to the caller.
    pub fn take_socket(&mut self, id: ConnectionId) -> Option<TcpStream> {
        self.ready.retain(|r| *r != id);
        self.sockets.remove(&id)
    }

    /// Borrows a watched socket, e.g. to `try_read` from it after
    /// [`PollResult::DataReady`].
    pub fn socket(&self, id: ConnectionId) -> Option<&TcpStream> {
        self.sockets.get(&id)
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Arms a one-shot deadline `after` from now, or disarms it with `None`.
    pub fn set_expire_time(&mut self, after: Option<Duration>) {
        self.deadline = after.map(|d| Instant::now() + d);
    }

    /// Sockets found readable by the last `poll` that returned
    /// [`PollResult::DataReady`].
    pub fn ready_sockets(&self) -> &[ConnectionId] {
        &self.ready
    }

    /// Blocks until a socket is readable, the deadline passes, or
    /// [`Interrupter::awake`] is called.
    pub async fn poll(&mut self) -> PollResult {
        self.ready.clear();

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => future::pending::<()>().await,
            }
        };

        let mut waits: FuturesUnordered<_> = self
            .sockets
            .iter()
            .map(|(id, socket)| async move { (*id, socket.readable().await) })
            .collect();
        let watching = !waits.is_empty();

        // Interrupts win over everything else so `awake` is never starved
        // by a chatty socket.
        tokio::select! {
            biased;
            () = self.interrupt.notified() => PollResult::NoAction,
            () = expiry => {
                self.deadline = None;
                PollResult::TimeExpired
            }
            Some((id, result)) = waits.next(), if watching => {
                if result.is_err() {
                    return PollResult::NoAction;
                }
                self.ready.push(id);
                // Collect anything else that is already readable without
                // waiting again.
                while let Some(Some((id, result))) = waits.next().now_or_never() {
                    if result.is_ok() {
                        self.ready.push(id);
                    }
                }
                PollResult::DataReady
            }
        }
    }
}
