//! Coordinator error types.

use thiserror::Error;
use volcast_net::NetError;

/// Errors raised by the cluster coordinator.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Configuration or partitioning input is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The attached renderer cannot take part in distributed rendering.
    #[error("Renderer does not support distributed rendering")]
    WrongRenderer,

    /// Transport failure while talking to one participant.
    #[error("Participant {participant}: {source}")]
    Socket {
        participant: usize,
        #[source]
        source: NetError,
    },

    /// Participants did not deliver their image within the frame timeout.
    #[error("Frame {frame} timed out waiting for participants {missing:?}")]
    FrameTimeout { frame: u64, missing: Vec<usize> },

    /// A participant's connection failed during a frame.
    #[error("Participant {participant} was lost")]
    ParticipantLost { participant: usize },

    /// No participant is left to render.
    #[error("No participants available")]
    NoParticipants,

    /// Worker thread could not be started.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<volcast_core::Error> for ClusterError {
    fn from(e: volcast_core::Error) -> Self {
        match e {
            volcast_core::Error::InvalidConfiguration(msg) => Self::InvalidConfiguration(msg),
            other => Self::InvalidConfiguration(other.to_string()),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ClusterError>;
