//! Local renderer capability consulted before distributing a volume.

use bitflags::bitflags;
use volcast_core::VolumeDesc;

bitflags! {
    /// What a local preview renderer can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RendererCapabilities: u32 {
        /// Can hand its volume to a cluster.
        const DISTRIBUTED  = 0b0000_0001;
        /// Accepts partial images carrying depth.
        const DEPTH_IMAGES = 0b0000_0010;
    }
}

/// The renderer a cluster client is attached to.
pub trait PreviewRenderer {
    fn capabilities(&self) -> RendererCapabilities;

    /// Volume to be partitioned.
    fn volume(&self) -> &VolumeDesc;

    fn supports_distributed_rendering(&self) -> bool {
        self.capabilities().contains(RendererCapabilities::DISTRIBUTED)
    }
}

/// A volume together with fixed capabilities.
#[derive(Clone, Debug)]
pub struct VolumePreview {
    volume: VolumeDesc,
    capabilities: RendererCapabilities,
}

impl VolumePreview {
    pub const fn new(volume: VolumeDesc, capabilities: RendererCapabilities) -> Self {
        Self {
            volume,
            capabilities,
        }
    }

    /// Preview that may be rendered by a cluster.
    pub const fn distributed(volume: VolumeDesc) -> Self {
        Self::new(volume, RendererCapabilities::DISTRIBUTED)
    }

    /// Preview restricted to local rendering.
    pub const fn local(volume: VolumeDesc) -> Self {
        Self::new(volume, RendererCapabilities::empty())
    }
}

impl PreviewRenderer for VolumePreview {
    fn capabilities(&self) -> RendererCapabilities {
        self.capabilities
    }

    fn volume(&self) -> &VolumeDesc {
        &self.volume
    }
}
