//! A minimal typed client, used by the lobby to reach game servers and by
//! tests and tools to talk to either server.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Duration;

use parlor_protocol::{
    ConnectionKind, GameEvent, GameRequest, LobbyEvent, LobbyRequest, StatusReport, WireMessage,
};
use parlor_transport::Connection;
use tokio::time;

use crate::ParlorError;

/// A client connection that sends `Req` and receives `Ev`.
pub struct Client<Req, Ev> {
    conn: Connection,
    _messages: PhantomData<fn(Req) -> Ev>,
}

/// Talks to a lobby.
pub type LobbyClient = Client<LobbyRequest, LobbyEvent>;

/// Talks to a game server.
pub type GameClient = Client<GameRequest, GameEvent>;

impl<Req: WireMessage, Ev: WireMessage> Client<Req, Ev> {
    /// Connects as a player. `read_timeout` bounds every [`recv`](Self::recv).
    pub async fn connect(addr: SocketAddr, read_timeout: Duration) -> Result<Self, ParlorError> {
        let conn = Connection::connect(addr, ConnectionKind::Client, read_timeout).await?;
        Ok(Self {
            conn,
            _messages: PhantomData,
        })
    }

    pub async fn send(&mut self, request: &Req) -> Result<(), ParlorError> {
        Ok(self.conn.send(request).await?)
    }

    /// Waits for the next event.
    pub async fn recv(&mut self) -> Result<Ev, ParlorError> {
        Ok(self.conn.recv().await?)
    }

    /// Skips events until one matches `wanted`, and returns it.
    pub async fn recv_until(&mut self, wanted: impl Fn(&Ev) -> bool) -> Result<Ev, ParlorError> {
        loop {
            let event = self.recv().await?;
            if wanted(&event) {
                return Ok(event);
            }
        }
    }
}

/// Asks a server how busy it is.
pub async fn probe_status(addr: SocketAddr, timeout: Duration) -> Result<StatusReport, ParlorError> {
    let exchange = async {
        let mut conn = Connection::connect(addr, ConnectionKind::Status, timeout).await?;
        let report = conn.recv::<StatusReport>().await?;
        Ok::<_, ParlorError>(report)
    };
    time::timeout(timeout, exchange)
        .await
        .map_err(|_| ParlorError::ServerTimeout)?
}
