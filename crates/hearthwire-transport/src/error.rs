/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A frame did not start with the packet marker byte.
    ///
    /// The stream cannot be resynchronized after this, so callers
    /// treat it as fatal for the connection.
    #[error("bad frame marker 0x{0:02X}")]
    BadMarker(u8),

    /// A frame body is larger than the 16-bit length prefix can carry.
    #[error("frame of {0} bytes exceeds the 65535 byte limit")]
    FrameTooLarge(usize),

    /// A frame declared a zero-length body (no opcode byte).
    #[error("empty frame")]
    EmptyFrame,

    /// Raw socket error surfaced by the framing codec.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
