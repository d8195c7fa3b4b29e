//! Binary space partition of the volume extent.
//!
//! Each leaf owns one participant's box. Traversal visits leaves in
//! visibility order relative to an eye point: back-to-front for "over"
//! compositing, front-to-back for "under" compositing.

use glam::Vec3;
use tracing::debug;
use volcast_core::{Aabb, Axis, Error, Result};

/// Visiting order of a traversal relative to the eye.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TraversalOrder {
    /// Farthest leaf first. Matches `dst = src + dst * (1 - src.a)`.
    #[default]
    BackToFront,
    /// Nearest leaf first. Matches `dst = dst + src * (1 - dst.a)`.
    FrontToBack,
}

/// A leaf of the partition: one participant's box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leaf {
    pub participant: usize,
    pub bounds: Aabb,
}

/// A node in the partition tree.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialNode {
    /// Split plane orthogonal to `axis` at `position`.
    ///
    /// `children[0]` is the lower side, `children[1]` the upper side.
    Internal {
        axis: Axis,
        position: f32,
        bounds: Aabb,
        children: Box<[SpatialNode; 2]>,
    },
    /// A participant's box.
    Leaf(Leaf),
}

impl SpatialNode {
    /// Bounds covered by this node.
    pub fn bounds(&self) -> &Aabb {
        match self {
            Self::Internal { bounds, .. } => bounds,
            Self::Leaf(leaf) => &leaf.bounds,
        }
    }

    /// Check if the node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Height of the subtree (a leaf has depth 0).
    pub fn depth(&self) -> usize {
        match self {
            Self::Internal { children, .. } => 1 + children[0].depth().max(children[1].depth()),
            Self::Leaf(_) => 0,
        }
    }

    /// Recursively split `bounds` among participants `first..first + weights.len()`.
    fn split(bounds: Aabb, weights: &[f32], first: usize) -> Self {
        if weights.len() == 1 {
            return Self::Leaf(Leaf {
                participant: first,
                bounds,
            });
        }

        let lower_count = weights.len() / 2;
        let (lower_weights, upper_weights) = weights.split_at(lower_count);
        // Summed in f64 so large finite weights cannot overflow.
        let lower_weight: f64 = lower_weights.iter().copied().map(f64::from).sum();
        let upper_weight: f64 = upper_weights.iter().copied().map(f64::from).sum();
        let fraction = (lower_weight / (lower_weight + upper_weight)) as f32;

        let axis = bounds.longest_axis();
        let position = axis.of(bounds.min) + axis.of(bounds.size()) * fraction;
        let (lower, upper) = bounds.split(axis, position);

        Self::Internal {
            axis,
            position,
            bounds,
            children: Box::new([
                Self::split(lower, lower_weights, first),
                Self::split(upper, upper_weights, first + lower_count),
            ]),
        }
    }

    fn visit<F: FnMut(&Leaf)>(&self, eye: Vec3, order: TraversalOrder, visitor: &mut F) {
        match self {
            Self::Leaf(leaf) => visitor(leaf),
            Self::Internal {
                axis,
                position,
                children,
                ..
            } => {
                // An eye on the plane counts as the lower side.
                let (near, far) = if axis.of(eye) <= *position {
                    (&children[0], &children[1])
                } else {
                    (&children[1], &children[0])
                };
                let (first, second) = match order {
                    TraversalOrder::BackToFront => (far, near),
                    TraversalOrder::FrontToBack => (near, far),
                };
                first.visit(eye, order, visitor);
                second.visit(eye, order, visitor);
            }
        }
    }

    fn collect_leaves(&self, out: &mut Vec<Leaf>) {
        match self {
            Self::Leaf(leaf) => out.push(*leaf),
            Self::Internal { children, .. } => {
                children[0].collect_leaves(out);
                children[1].collect_leaves(out);
            }
        }
    }
}

/// Partition of a volume extent into one box per participant.
///
/// Building is deterministic: the same extent and weights always give the
/// same tree, so a reconnecting participant gets the same box back.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialPartitionTree {
    root: SpatialNode,
    leaves: Vec<Leaf>,
}

impl SpatialPartitionTree {
    /// Split `extent` into `participant_count` equally sized boxes.
    pub fn build(extent: Aabb, participant_count: usize) -> Result<Self> {
        if participant_count == 0 {
            return Err(Error::InvalidConfiguration(
                "cannot partition a volume among zero participants".to_string(),
            ));
        }
        Self::build_weighted(extent, &vec![1.0; participant_count])
    }

    /// Split `extent` with box volumes proportional to `weights`.
    ///
    /// Participant `i` receives a share proportional to `weights[i]`.
    pub fn build_weighted(extent: Aabb, weights: &[f32]) -> Result<Self> {
        if weights.is_empty() {
            return Err(Error::InvalidConfiguration(
                "cannot partition a volume among zero participants".to_string(),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "participant weight must be positive and finite, got {w}"
            )));
        }
        if !extent.is_solid() {
            return Err(Error::InvalidConfiguration(format!(
                "volume extent is degenerate: {extent:?}"
            )));
        }

        let root = SpatialNode::split(extent, weights, 0);
        let mut leaves = Vec::with_capacity(weights.len());
        root.collect_leaves(&mut leaves);

        if let Some(leaf) = leaves.iter().find(|leaf| !leaf.bounds.is_solid()) {
            return Err(Error::InvalidConfiguration(format!(
                "participant {} would receive an empty box",
                leaf.participant
            )));
        }

        debug!(
            "Partitioned {:?} into {} boxes (depth {})",
            extent,
            leaves.len(),
            root.depth()
        );
        Ok(Self { root, leaves })
    }

    pub fn root(&self) -> &SpatialNode {
        &self.root
    }

    /// Bounds of the whole partition.
    pub fn extent(&self) -> &Aabb {
        self.root.bounds()
    }

    pub fn participant_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Leaves in participant order.
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Leaf owned by `participant`.
    pub fn leaf(&self, participant: usize) -> Option<&Leaf> {
        self.leaves.get(participant)
    }

    /// Participant whose box contains `point`. Points on a split plane
    /// belong to the lower side.
    pub fn locate(&self, point: Vec3) -> Option<usize> {
        if !self.extent().contains_point(point) {
            return None;
        }
        let mut node = &self.root;
        loop {
            match node {
                SpatialNode::Leaf(leaf) => return Some(leaf.participant),
                SpatialNode::Internal {
                    axis,
                    position,
                    children,
                    ..
                } => {
                    node = if axis.of(point) <= *position {
                        &children[0]
                    } else {
                        &children[1]
                    };
                }
            }
        }
    }

    /// Visit every leaf back-to-front relative to `eye`.
    pub fn traverse<F: FnMut(&Leaf)>(&self, eye: Vec3, visitor: F) {
        self.traverse_ordered(eye, TraversalOrder::BackToFront, visitor);
    }

    /// Visit every leaf in the given order relative to `eye`.
    pub fn traverse_ordered<F: FnMut(&Leaf)>(
        &self,
        eye: Vec3,
        order: TraversalOrder,
        mut visitor: F,
    ) {
        self.root.visit(eye, order, &mut visitor);
    }

    /// Participant indices in back-to-front order.
    pub fn traversal_order(&self, eye: Vec3) -> Vec<usize> {
        self.ordered(eye, TraversalOrder::BackToFront)
    }

    /// Participant indices in the given order.
    pub fn ordered(&self, eye: Vec3, order: TraversalOrder) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.leaves.len());
        self.traverse_ordered(eye, order, |leaf| indices.push(leaf.participant));
        indices
    }
}
