//! Coordinator side of a volcast rendering cluster.
//!
//! The coordinator partitions the volume across participants, broadcasts
//! camera and parameter updates, gathers one partial image per participant
//! and per frame on a pool of worker threads, and composites the images in
//! visibility order into a single framebuffer.
//!
//! # Example
//!
//! ```ignore
//! let config = ClusterConfig::new(vec![
//!     ParticipantAddress::parse("10.0.0.2:31050")?,
//!     ParticipantAddress::parse("10.0.0.3:31050")?,
//! ]);
//! let renderer = VolumePreview::distributed(volume);
//! let mut client = ClusterClient::connect(config, &renderer)?;
//! let stats = client.render(&camera.view_state())?;
//! client.framebuffer().save_png("frame.png")?;
//! ```

pub mod barrier;
pub mod client;
pub mod compositor;
pub mod config;
pub mod error;
pub mod renderer;
pub mod slots;
pub mod worker;

pub use barrier::{BarrierError, FrameBarrier};
pub use client::{ClusterClient, FrameStats, ParameterType};
pub use compositor::{CompositeOrder, Compositor, Framebuffer};
pub use config::{ClusterConfig, ParticipantAddress, PartialFramePolicy};
pub use error::{ClusterError, Result};
pub use renderer::{PreviewRenderer, RendererCapabilities, VolumePreview};
pub use slots::{ImageSlots, SlotEntry};
pub use worker::{ImageWorkerPool, WorkerEvent};
