//! Outrigger error types.
//!
//! One taxonomy shared by the synchronous calls, the queued operations, and
//! the in-process transport.

use std::io;
use thiserror::Error;

/// Main error type for socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    /// The native call could not complete immediately.
    ///
    /// Inside the dispatch loop this is a retry signal and never reaches a
    /// completion handler. Synchronous callers see it only for explicitly
    /// non-blocking calls or when a send/receive timeout option expires,
    /// mirroring EAGAIN semantics.
    #[error("Operation would block")]
    WouldBlock,

    /// Operation flushed by cancel or socket close.
    #[error("Operation aborted")]
    Aborted,

    /// Multipart receive ran out of destination buffers.
    ///
    /// Partial success: `transferred` counts the bytes delivered before the
    /// buffers were exhausted, and `more` reports whether parts remain.
    #[error("No buffer space: {transferred} bytes transferred, more parts: {more}")]
    NoBufferSpace { transferred: usize, more: bool },

    /// Operation attempted on a shut-down direction or a dead link.
    #[error("Socket not connected")]
    NotConnected,

    /// Bind target already has a listener.
    #[error("Address in use: {0}")]
    AddressInUse(String),

    /// Malformed endpoint, or no listener at the connect target.
    #[error("Address invalid: {0}")]
    AddressInvalid(String),

    /// Endpoint scheme the primitive does not implement.
    #[error("Transport unsupported: {0}")]
    TransportUnsupported(String),

    /// Unknown option identifier or value of the wrong shape.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Operation not legal in the socket's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The primitive refused to allocate a native handle.
    #[error("Socket creation failed: {0}")]
    SocketCreationFailed(String),

    /// IO error surfaced by the primitive.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;

impl SocketError {
    /// Create an invalid-state error with a message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create an invalid-option error with a message.
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }

    /// True when the condition should be retried on the next readiness edge
    /// rather than delivered to the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::WouldBlock => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SocketError::WouldBlock.is_retryable());
        assert!(!SocketError::Aborted.is_retryable());
        assert!(!SocketError::NotConnected.is_retryable());
        assert!(!SocketError::NoBufferSpace {
            transferred: 3,
            more: true
        }
        .is_retryable());
    }

    #[test]
    fn test_io_wouldblock_is_retryable() {
        let err = SocketError::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(err.is_retryable());
    }
}
