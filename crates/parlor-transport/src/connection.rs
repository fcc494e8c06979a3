//! TCP listener and packet-level connections.

use std::net::SocketAddr;
use std::time::Duration;

use parlor_protocol::{ConnectionKind, Packet, ReadOutcome, WireMessage};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::{ConnectionId, TransportError};

/// Accepts incoming TCP connections.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    /// Binds to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "listening");
        }
        Ok(Self { listener })
    }

    /// The address actually bound (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next incoming connection.
    pub async fn accept(
        &self,
    ) -> Result<(ConnectionId, TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted connection");
        Ok((id, stream, addr))
    }
}

async fn read_message<R, M>(
    reader: &mut R,
    packet: &mut Packet,
    read_timeout: Duration,
) -> Result<M, TransportError>
where
    R: AsyncRead + Unpin,
    M: WireMessage,
{
    match packet.read_from(reader, read_timeout).await {
        ReadOutcome::Received => Ok(M::decode(packet)?),
        ReadOutcome::TimedOut => Err(TransportError::TimedOut),
        ReadOutcome::Disconnected => Err(TransportError::ConnectionClosed),
        ReadOutcome::Corrupt => Err(TransportError::Corrupt),
    }
}

async fn write_message<W, M>(writer: &mut W, msg: &M) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    M: WireMessage,
{
    let packet = msg.encode()?;
    packet
        .write_to(writer)
        .await
        .map_err(TransportError::SendFailed)
}

/// A single TCP connection that sends and receives whole packets.
pub struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    read_timeout: Duration,
    inbound: Packet,
}

impl Connection {
    /// Wraps an accepted stream.
    pub fn new(id: ConnectionId, stream: TcpStream, read_timeout: Duration) -> Self {
        // Packets are small and latency-bound; don't let Nagle batch them.
        let _ = stream.set_nodelay(true);
        Self {
            id,
            stream,
            read_timeout,
            inbound: Packet::new(),
        }
    }

    /// Opens an outgoing connection and announces what kind of peer we are.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        kind: ConnectionKind,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        stream
            .write_all(&[u8::from(kind)])
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(Self::new(ConnectionId::next(), stream, read_timeout))
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The remote address, if the socket still knows it.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Sends one message.
    pub async fn send<M: WireMessage>(&mut self, msg: &M) -> Result<(), TransportError> {
        write_message(&mut self.stream, msg).await
    }

    /// Waits up to the read timeout for the next message.
    pub async fn recv<M: WireMessage>(&mut self) -> Result<M, TransportError> {
        read_message(&mut self.stream, &mut self.inbound, self.read_timeout).await
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read, write) = self.stream.into_split();
        (
            ConnectionReader {
                id: self.id,
                read,
                read_timeout: self.read_timeout,
                inbound: self.inbound,
            },
            ConnectionWriter { id: self.id, write },
        )
    }
}

/// The read half of a [`Connection`].
pub struct ConnectionReader {
    id: ConnectionId,
    read: OwnedReadHalf,
    read_timeout: Duration,
    inbound: Packet,
}

impl ConnectionReader {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits up to the read timeout for the next message.
    pub async fn recv<M: WireMessage>(&mut self) -> Result<M, TransportError> {
        read_message(&mut self.read, &mut self.inbound, self.read_timeout).await
    }
}

/// The write half of a [`Connection`].
pub struct ConnectionWriter {
    id: ConnectionId,
    write: OwnedWriteHalf,
}

impl ConnectionWriter {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one message.
    pub async fn send<M: WireMessage>(&mut self, msg: &M) -> Result<(), TransportError> {
        write_message(&mut self.write, msg).await
    }

    /// Shuts down the write direction; the peer sees end-of-stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.write
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
