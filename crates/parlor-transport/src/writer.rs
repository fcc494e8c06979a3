//! Per-connection outbound queue.

use parlor_protocol::WireMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ConnectionWriter;

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound<M> {
    Send(M),
    /// Flush what came before, then close the write side.
    Close,
}

/// Sending end of an outbound queue.
///
/// Unbounded so that pushing never waits: callers push while holding
/// shared-state locks, and the writer task does the actual I/O.
pub type Outbox<M> = mpsc::UnboundedSender<Outbound<M>>;

/// Spawns a task that writes queued messages in order until the queue is
/// closed, a [`Outbound::Close`] arrives, or a write fails.
pub fn spawn_writer<M: WireMessage>(
    mut writer: ConnectionWriter,
    mut rx: mpsc::UnboundedReceiver<Outbound<M>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let id = writer.id();
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Send(msg) => {
                    if let Err(e) = writer.send(&msg).await {
                        tracing::debug!(%id, error = %e, "write failed, dropping queue");
                        return;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = writer.shutdown().await;
        tracing::trace!(%id, "writer finished");
    })
}
