//! Partial images returned by rendering participants.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::ScreenRect;

/// Premultiplied RGBA, 8 bits per channel.
pub type Rgba8 = [u8; 4];

/// A participant's rendering of its bricks for one frame.
///
/// Pixels are premultiplied RGBA8 in row-major order, top row first, and
/// cover `rect` in the destination framebuffer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameImage {
    /// Participant that rendered the image
    pub participant: usize,
    /// Frame sequence number the image belongs to
    pub frame: u64,
    /// Placement in the destination framebuffer
    pub rect: ScreenRect,
    /// `rect.area() * 4` bytes of premultiplied RGBA
    pub color: Vec<u8>,
    /// Optional per-pixel depth for image based rendering
    pub depth: Option<Vec<f32>>,
}

impl FrameImage {
    /// Create an image, checking channel sizes against `rect`.
    pub fn new(
        participant: usize,
        rect: ScreenRect,
        color: Vec<u8>,
        depth: Option<Vec<f32>>,
    ) -> Result<Self> {
        let image = Self {
            participant,
            frame: 0,
            rect,
            color,
            depth,
        };
        image.validate()?;
        Ok(image)
    }

    /// Create an image covering `rect` filled with a single color.
    pub fn filled(participant: usize, rect: ScreenRect, rgba: Rgba8) -> Self {
        Self {
            participant,
            frame: 0,
            rect,
            color: rgba.repeat(rect.area()),
            depth: None,
        }
    }

    /// Image covering nothing. Composites as a no-op.
    pub fn empty(participant: usize) -> Self {
        Self {
            participant,
            ..Default::default()
        }
    }

    /// Check that channel sizes match the rectangle.
    pub fn validate(&self) -> Result<()> {
        let area = self.rect.area();
        if self.color.len() != area * 4 {
            return Err(Error::InvalidData(format!(
                "color buffer holds {} bytes, expected {} for {}x{}",
                self.color.len(),
                area * 4,
                self.rect.width,
                self.rect.height
            )));
        }
        if let Some(depth) = &self.depth {
            if depth.len() != area {
                return Err(Error::InvalidData(format!(
                    "depth buffer holds {} samples, expected {area}",
                    depth.len()
                )));
            }
        }
        Ok(())
    }

    /// Pixels as RGBA quadruples.
    #[inline]
    pub fn pixels(&self) -> &[Rgba8] {
        bytemuck::cast_slice(&self.color)
    }

    /// Pixel at image-local coordinates.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        self.pixels()[y as usize * self.rect.width as usize + x as usize]
    }

    /// Stamp the frame sequence number.
    pub fn with_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }
}
