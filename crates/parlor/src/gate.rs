//! The connection gate: where new sockets wait until they say what they
//! are.
//!
//! Every connection opens with a single raw byte naming its kind (client,
//! peer server, status probe). Rather than park one task per silent
//! socket, the gate keeps all of them in one [`SocketMultiplexer`]:
//!
//! ```text
//!  accept loop ──(id, stream)──▶ channel ──▶ sorter task
//!       └──────────── awake() ───────────────▶ │ poll()
//!                                              ├─ DataReady   → read kind, dispatch
//!                                              └─ TimeExpired → drop stragglers
//! ```
//!
//! A socket that hasn't identified itself within the identify timeout is
//! closed.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use parlor_protocol::{ConnectionKind, StatusReport};
use parlor_transport::{Connection, ConnectionId, Listener, PollResult, SocketMultiplexer};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::time::Instant;

use crate::ParlorError;

/// Accepts connections until the process ends, handing every socket that
/// identifies itself to `dispatch`.
pub(crate) async fn run<F>(
    listener: Listener,
    identify_timeout: Duration,
    dispatch: F,
) -> Result<(), ParlorError>
where
    F: FnMut(ConnectionId, ConnectionKind, TcpStream) + Send + 'static,
{
    let mux = SocketMultiplexer::new();
    let interrupter = mux.interrupter();
    let (arrivals, rx) = mpsc::unbounded_channel();
    tokio::spawn(sort_arrivals(mux, rx, identify_timeout, dispatch));

    loop {
        match listener.accept().await {
            Ok((id, stream, _addr)) => {
                if arrivals.send((id, stream)).is_err() {
                    tracing::error!("connection gate stopped");
                    return Ok(());
                }
                interrupter.awake();
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

enum Identified {
    Kind(ConnectionKind),
    NotYet,
    Failed(String),
}

fn read_kind(mux: &SocketMultiplexer, id: ConnectionId) -> Identified {
    let Some(socket) = mux.socket(id) else {
        return Identified::Failed("socket gone".into());
    };
    let mut byte = [0u8; 1];
    match socket.try_read(&mut byte) {
        Ok(0) => Identified::Failed("closed before identifying".into()),
        Ok(_) => match ConnectionKind::try_from(byte[0]) {
            Ok(kind) => Identified::Kind(kind),
            Err(e) => Identified::Failed(e.to_string()),
        },
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Identified::NotYet,
        Err(e) => Identified::Failed(e.to_string()),
    }
}

async fn sort_arrivals<F>(
    mut mux: SocketMultiplexer,
    mut arrivals: UnboundedReceiver<(ConnectionId, TcpStream)>,
    identify_timeout: Duration,
    mut dispatch: F,
) where
    F: FnMut(ConnectionId, ConnectionKind, TcpStream) + Send + 'static,
{
    let mut waiting_since: HashMap<ConnectionId, Instant> = HashMap::new();

    loop {
        loop {
            match arrivals.try_recv() {
                Ok((id, stream)) => {
                    mux.add_socket(id, stream);
                    waiting_since.insert(id, Instant::now());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if mux.is_empty() {
                        return;
                    }
                    break;
                }
            }
        }

        // Wake up when the oldest waiting socket runs out of time.
        let now = Instant::now();
        let next_expiry = waiting_since
            .values()
            .min()
            .map(|since| (*since + identify_timeout).saturating_duration_since(now));
        mux.set_expire_time(next_expiry);

        match mux.poll().await {
            PollResult::NoAction => {}
            PollResult::TimeExpired => {
                let now = Instant::now();
                waiting_since.retain(|id, since| {
                    let expired = now.duration_since(*since) >= identify_timeout;
                    if expired {
                        mux.remove_socket(*id);
                        tracing::debug!(%id, "dropped connection that never identified itself");
                    }
                    !expired
                });
            }
            PollResult::DataReady => {
                let ready = mux.ready_sockets().to_vec();
                for id in ready {
                    match read_kind(&mux, id) {
                        Identified::NotYet => {}
                        Identified::Kind(kind) => {
                            waiting_since.remove(&id);
                            if let Some(stream) = mux.take_socket(id) {
                                tracing::debug!(%id, ?kind, "connection identified");
                                dispatch(id, kind, stream);
                            }
                        }
                        Identified::Failed(reason) => {
                            waiting_since.remove(&id);
                            mux.remove_socket(id);
                            tracing::debug!(%id, %reason, "dropped unidentified connection");
                        }
                    }
                }
            }
        }
    }
}

/// Answers a status probe with one report and closes the connection.
pub(crate) async fn answer_status(
    id: ConnectionId,
    stream: TcpStream,
    report: StatusReport,
) -> Result<(), ParlorError> {
    let mut conn = Connection::new(id, stream, Duration::from_secs(1));
    conn.send(&report).await?;
    tracing::debug!(%id, rooms = report.rooms, users = report.users, "answered status probe");
    Ok(())
}

/// Saturating conversion for the status report's `u32` counters.
pub(crate) fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
