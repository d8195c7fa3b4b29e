//! Volume descriptors and bricks.

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::Aabb;

/// Description of a (possibly time-varying) voxel grid.
///
/// The voxel payload itself is owned by the rendering participants; the
/// coordinator only needs the geometry to partition it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeDesc {
    /// Voxels per axis
    pub dims: UVec3,
    /// Bytes per channel (1, 2 or 4)
    pub bytes_per_channel: u32,
    /// Number of channels per voxel
    pub channels: u32,
    /// Object-space distance between voxel centers per axis
    pub spacing: Vec3,
    /// Object-space center of the volume
    pub position: Vec3,
    /// Number of time steps
    pub frames: u32,
    /// Currently displayed time step
    pub current_frame: u32,
}

impl Default for VolumeDesc {
    fn default() -> Self {
        Self {
            dims: UVec3::ONE,
            bytes_per_channel: 1,
            channels: 1,
            spacing: Vec3::ONE,
            position: Vec3::ZERO,
            frames: 1,
            current_frame: 0,
        }
    }
}

impl VolumeDesc {
    /// Create a single-frame, single-channel 8-bit volume with unit spacing.
    pub fn new(dims: UVec3) -> Self {
        Self {
            dims,
            ..Default::default()
        }
    }

    /// Set the voxel spacing.
    pub fn with_spacing(mut self, spacing: Vec3) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the object-space center.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set the number of time steps.
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    /// Set the channel layout.
    pub fn with_channels(mut self, channels: u32, bytes_per_channel: u32) -> Self {
        self.channels = channels;
        self.bytes_per_channel = bytes_per_channel;
        self
    }

    /// Bytes needed for one time step.
    pub fn frame_bytes(&self) -> usize {
        self.dims.x as usize
            * self.dims.y as usize
            * self.dims.z as usize
            * self.channels as usize
            * self.bytes_per_channel as usize
    }

    /// Object-space size of the volume.
    pub fn size(&self) -> Vec3 {
        self.dims.as_vec3() * self.spacing
    }

    /// Object-space bounding box, centered at `position`.
    pub fn extent(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size())
    }

    /// Validate the descriptor.
    pub fn validate(&self) -> Result<()> {
        if self.dims.cmpeq(UVec3::ZERO).any() {
            return Err(Error::InvalidConfiguration(format!(
                "volume has zero voxels along an axis: {}",
                self.dims
            )));
        }
        if self.frames == 0 {
            return Err(Error::InvalidConfiguration(
                "volume has no time steps".to_string(),
            ));
        }
        if self.current_frame >= self.frames {
            return Err(Error::InvalidConfiguration(format!(
                "current frame {} out of range for {} time steps",
                self.current_frame, self.frames
            )));
        }
        if !self.extent().is_solid() {
            return Err(Error::InvalidConfiguration(format!(
                "volume extent is degenerate: {:?}",
                self.extent()
            )));
        }
        Ok(())
    }
}

/// Axis-aligned sub-volume assigned to exactly one participant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    /// Object-space bounds
    pub bounds: Aabb,
    /// Owning participant index
    pub participant: usize,
    /// Time step this brick is valid for
    pub frame: u32,
}

impl Brick {
    /// Create a new brick.
    #[inline]
    pub const fn new(bounds: Aabb, participant: usize, frame: u32) -> Self {
        Self {
            bounds,
            participant,
            frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_is_centered_on_position() {
        let volume = VolumeDesc::new(UVec3::new(4, 2, 2))
            .with_spacing(Vec3::splat(0.5))
            .with_position(Vec3::new(1.0, 0.5, 0.5));
        let extent = volume.extent();
        assert_eq!(extent.min, Vec3::ZERO);
        assert_eq!(extent.max, Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn frame_bytes_accounts_for_channels() {
        let volume = VolumeDesc::new(UVec3::new(8, 8, 8)).with_channels(4, 2);
        assert_eq!(volume.frame_bytes(), 8 * 8 * 8 * 4 * 2);
    }

    #[test]
    fn validate_rejects_empty_volume() {
        assert!(VolumeDesc::new(UVec3::new(0, 4, 4)).validate().is_err());
        assert!(VolumeDesc::new(UVec3::ONE).with_frames(0).validate().is_err());
        assert!(VolumeDesc::new(UVec3::ONE)
            .with_spacing(Vec3::new(1.0, 0.0, 1.0))
            .validate()
            .is_err());
        assert!(VolumeDesc::new(UVec3::splat(16)).validate().is_ok());
    }
}
