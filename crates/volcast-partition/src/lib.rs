//! Spatial partitioning for distributed volume rendering.
//!
//! The volume extent is split into one disjoint box per participant by a
//! binary space partition. Traversing the tree relative to the eye gives the
//! visibility order needed for correct compositing.

pub mod bricks;
pub mod tree;

pub use bricks::BrickLayout;
pub use tree::{Leaf, SpatialNode, SpatialPartitionTree, TraversalOrder};
