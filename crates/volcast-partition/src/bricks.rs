//! Subdivision of partition leaves into bricks for distribution.

use glam::{DVec3, UVec3, Vec3};
use volcast_core::{Aabb, Brick, Error, Result};

use crate::tree::{Leaf, SpatialPartitionTree};

/// Upper bound on the bricks cut from one leaf for one time step.
pub const MAX_BRICKS_PER_LEAF: u64 = 1 << 16;

/// Brick lists for one participant, indexed by time step.
pub type BrickLists = Vec<Vec<Brick>>;

/// How each leaf is cut into bricks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BrickLayout {
    max_extent: Option<Vec3>,
}

impl BrickLayout {
    /// One brick per leaf.
    pub const fn single() -> Self {
        Self { max_extent: None }
    }

    /// Bricks no larger than `max_extent` along any axis.
    pub fn with_max_extent(max_extent: Vec3) -> Result<Self> {
        if !max_extent.is_finite() || max_extent.cmple(Vec3::ZERO).any() {
            return Err(Error::InvalidConfiguration(format!(
                "brick extent must be positive, got {max_extent}"
            )));
        }
        Ok(Self {
            max_extent: Some(max_extent),
        })
    }

    /// Number of bricks per axis for a box of the given size.
    ///
    /// Fails if the box would be cut into more than
    /// [`MAX_BRICKS_PER_LEAF`] bricks.
    pub fn grid(&self, size: Vec3) -> Result<UVec3> {
        let Some(max) = self.max_extent else {
            return Ok(UVec3::ONE);
        };
        let cells = (size.as_dvec3() / max.as_dvec3()).ceil().max(DVec3::ONE);
        let count = cells.x * cells.y * cells.z;
        if !count.is_finite() || count > MAX_BRICKS_PER_LEAF as f64 {
            return Err(Error::InvalidConfiguration(format!(
                "brick extent {max} cuts a {size} box into more than {MAX_BRICKS_PER_LEAF} bricks"
            )));
        }
        Ok(cells.as_uvec3())
    }

    /// Bricks tiling `leaf` for time step `frame`.
    pub fn bricks_for(&self, leaf: &Leaf, frame: u32) -> Result<Vec<Brick>> {
        let bounds = leaf.bounds;
        let grid = self.grid(bounds.size())?;
        let edge = |axis: usize, i: u32| -> f32 {
            if i == grid[axis] {
                bounds.max[axis]
            } else {
                bounds.min[axis] + bounds.size()[axis] * (i as f32 / grid[axis] as f32)
            }
        };

        let mut bricks = Vec::with_capacity(grid.element_product() as usize);
        for z in 0..grid.z {
            for y in 0..grid.y {
                for x in 0..grid.x {
                    let min = Vec3::new(edge(0, x), edge(1, y), edge(2, z));
                    let max = Vec3::new(edge(0, x + 1), edge(1, y + 1), edge(2, z + 1));
                    bricks.push(Brick::new(Aabb::new(min, max), leaf.participant, frame));
                }
            }
        }
        Ok(bricks)
    }

    /// Per participant, one brick list per time step.
    pub fn distribution(
        &self,
        tree: &SpatialPartitionTree,
        frames: u32,
    ) -> Result<Vec<BrickLists>> {
        tree.leaves()
            .iter()
            .map(|leaf| (0..frames).map(|f| self.bricks_for(leaf, f)).collect())
            .collect()
    }
}
