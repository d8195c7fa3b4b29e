//! Transport channel between the coordinator and rendering participants.
//!
//! Messages are bincode encoded and framed with a little-endian `u32`
//! length prefix. Every command is sent as a reason tag followed by its
//! payload; if the tag cannot be sent the payload is dropped so the stream
//! stays framed.
//!
//! Each connection is split into a write half owned by the coordinator
//! ([`ParticipantProxy`]) and a read half owned by that participant's image
//! worker ([`ImageReceiver`]).

mod channel;
mod command;
mod error;
pub mod protocol;
mod proxy;

pub use channel::{MessageReader, MessageWriter};
pub use command::{Command, RenderState};
pub use error::{NetError, Result};
pub use protocol::{CommReason, Message, MAX_MESSAGE_LEN, PROTOCOL_VERSION};
pub use proxy::{connect, ConnectionHandle, ImageReceiver, ParticipantProxy};
