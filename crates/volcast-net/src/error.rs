//! Transport error types.

use thiserror::Error;

/// Errors raised by the transport channel.
#[derive(Error, Debug)]
pub enum NetError {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// Peer closed the connection, or it was closed locally.
    #[error("Connection closed")]
    Closed,

    /// Frame length exceeds [`crate::MAX_MESSAGE_LEN`].
    #[error("Message of {0} bytes exceeds the frame limit")]
    MessageTooLarge(usize),

    /// A different message kind arrived than the one expected.
    #[error("Expected {expected} message, got {found}")]
    UnexpectedMessage {
        expected: &'static str,
        found: &'static str,
    },

    /// Peers speak different protocol versions.
    #[error("Protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u8, remote: u8 },

    /// Received image failed validation.
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] volcast_core::Error),
}

impl NetError {
    /// True if the error means the connection is gone rather than a bad message.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, NetError>;
