use parlor_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection, or it broke while reading.
    #[error("connection closed")]
    ConnectionClosed,

    /// No packet started arriving within the read timeout.
    ///
    /// Not fatal: the caller may simply try again.
    #[error("timed out waiting for a packet")]
    TimedOut,

    /// The peer sent a frame whose declared length could not be honoured.
    #[error("corrupt frame")]
    Corrupt,

    /// The frame arrived but its contents don't match any message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Opening an outgoing connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the connection can no longer be used.
    ///
    /// Only a read timeout leaves the stream in a usable state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::TimedOut)
    }
}
