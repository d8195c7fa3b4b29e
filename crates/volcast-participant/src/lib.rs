//! Rendering participant for volcast clusters.
//!
//! A participant accepts one coordinator, stores the bricks it was assigned,
//! tracks the rendering parameters the coordinator broadcasts and answers
//! every camera update with one partial image.

mod error;
mod renderer;
mod server;

pub use error::{Result, ServeError};
pub use renderer::{BrickRenderer, FlatRenderer};
pub use server::{run_session, ParticipantServer, SessionSummary};
