//! Core types and math for the volcast distributed volume renderer.
//!
//! This crate provides the foundational types shared by the coordinator and
//! the rendering participants:
//! - Volume descriptors and bricks
//! - Bounding boxes, screen rectangles and view state
//! - Transfer functions
//! - Frame images exchanged over the network

pub mod camera;
pub mod error;
pub mod image;
pub mod math;
pub mod transfer;
pub mod volume;

pub use camera::Camera;
pub use error::{Error, Result};
pub use image::{FrameImage, Rgba8};
pub use math::{Aabb, Axis, ScreenRect, ViewState};
pub use transfer::{ControlPoint, TransferFunction};
pub use volume::{Brick, VolumeDesc};
