//! Error types for the server crate.

use hearthwire_dialog::DialogError;
use hearthwire_protocol::FrameError;
use hearthwire_session::SessionError;
use hearthwire_transport::TransportError;

use crate::storage::StorageError;

/// Top-level error that wraps all crate-specific errors.
///
/// Starting the server, loading configuration, and a connection task's
/// final result all surface as this type. The `#[from]` attribute on
/// each variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HearthwireError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bytes that aren't a packet we can read.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Authentication or redirect failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A dialog graph that can't be walked.
    #[error(transparent)]
    Dialog(#[from] DialogError),

    /// The persistence service failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A handler decided the connection must end.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Configuration or template files could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a handler ended its connection.
///
/// Only fatal kinds live here. Precondition failures never become
/// errors; the handler just returns without doing anything.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload didn't parse. Fatal for secured packets, where the
    /// cipher stream can no longer be trusted; ignored otherwise.
    #[error("malformed payload: {0}")]
    Malformed(#[from] FrameError),

    /// A packet that isn't allowed in the connection's current state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The persisted actor record failed its sanity bounds.
    #[error("corrupt actor record for {username}: {reason}")]
    StateCorruption { username: String, reason: String },

    /// The session could not be handed off or admitted.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Sending to the client failed; the socket is gone.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wrapped: HearthwireError = err.into();
        assert!(matches!(wrapped, HearthwireError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
    }

    #[test]
    fn test_from_frame_error() {
        let wrapped: HearthwireError = FrameError::UnknownOpcode(0xEE).into();
        assert!(matches!(wrapped, HearthwireError::Frame(_)));
        assert!(wrapped.to_string().contains("0xEE"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NoPendingRedirect("ayla".into());
        let wrapped: HearthwireError = err.into();
        assert!(matches!(wrapped, HearthwireError::Session(_)));
    }

    #[test]
    fn test_from_handler_error() {
        let err = HandlerError::ProtocolViolation("enter world twice".into());
        let wrapped: HearthwireError = err.into();
        assert!(matches!(wrapped, HearthwireError::Handler(_)));
    }

    #[test]
    fn test_handler_error_from_frame_error_is_malformed() {
        let err: HandlerError = FrameError::Truncated {
            needed: 2,
            remaining: 0,
        }
        .into();
        assert!(matches!(err, HandlerError::Malformed(_)));
    }
}
