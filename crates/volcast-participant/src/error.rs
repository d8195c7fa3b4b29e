//! Participant error types.

use thiserror::Error;
use volcast_net::NetError;

/// Errors that end a participant session.
#[derive(Error, Debug)]
pub enum ServeError {
    /// Connection or protocol failure.
    #[error("Transport error: {0}")]
    Net(#[from] NetError),

    /// The renderer could not produce an image.
    #[error("Render error: {0}")]
    Render(#[from] volcast_core::Error),
}

impl From<std::io::Error> for ServeError {
    fn from(e: std::io::Error) -> Self {
        Self::Net(NetError::Io(e))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ServeError>;
