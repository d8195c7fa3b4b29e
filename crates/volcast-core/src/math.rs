//! Bounding boxes, screen rectangles and view math.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Distance along the view axis used as the eye for orthographic projections.
pub const ORTHO_EYE_DISTANCE: f32 = 1.0e6;

/// A coordinate axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Component index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Read this axis' component of a vector.
    #[inline]
    pub fn of(self, v: Vec3) -> f32 {
        v[self.index()]
    }
}

/// Axis-Aligned Bounding Box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at `center` with the given size
    #[inline]
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Get the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the AABB
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Volume enclosed by the box (zero for inverted boxes).
    #[inline]
    pub fn volume(&self) -> f32 {
        let size = self.size().max(Vec3::ZERO);
        size.x * size.y * size.z
    }

    /// True if every corner is finite and the box has positive extent on all axes.
    pub fn is_solid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x < self.max.x
            && self.min.y < self.max.y
            && self.min.z < self.max.z
    }

    /// The axis with the largest extent. Ties resolve to the lower axis.
    pub fn longest_axis(&self) -> Axis {
        let size = self.size();
        let mut best = Axis::X;
        for axis in [Axis::Y, Axis::Z] {
            if axis.of(size) > best.of(size) {
                best = axis;
            }
        }
        best
    }

    /// Split the box with a plane orthogonal to `axis` at `position`.
    ///
    /// Returns the lower and upper halves. The halves share the split face.
    pub fn split(&self, axis: Axis, position: f32) -> (Self, Self) {
        let mut lower = *self;
        let mut upper = *self;
        lower.max[axis.index()] = position;
        upper.min[axis.index()] = position;
        (lower, upper)
    }

    /// Check if a point is inside the AABB
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Intersection of two boxes, or `None` if they don't overlap in volume.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        let overlap = Self { min, max };
        (overlap.volume() > 0.0).then_some(overlap)
    }

    /// Merge two AABBs
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Pixel rectangle inside a framebuffer. Row 0 is the top row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` viewport.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True if the rectangle covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip against a `width` x `height` viewport.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let x0 = i64::from(self.x).clamp(0, i64::from(width));
        let y0 = i64::from(self.y).clamp(0, i64::from(height));
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, i64::from(width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, i64::from(height));
        Self::new(x0 as i32, y0 as i32, (x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32)
    }
}

/// Camera state broadcast to participants every frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub projection: Mat4,
    pub modelview: Mat4,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
        }
    }
}

impl ViewState {
    /// Create a new view state.
    #[inline]
    pub const fn new(projection: Mat4, modelview: Mat4) -> Self {
        Self {
            projection,
            modelview,
        }
    }

    /// True if the projection has a perspective divide.
    #[inline]
    pub fn is_perspective(&self) -> bool {
        self.projection.w_axis.w == 0.0
    }

    /// Eye position in object space.
    ///
    /// For orthographic projections the eye sits [`ORTHO_EYE_DISTANCE`] units
    /// behind the view plane.
    pub fn eye_position(&self) -> Vec3 {
        let inverse = self.modelview.inverse();
        if self.is_perspective() {
            inverse.transform_point3(Vec3::ZERO)
        } else {
            inverse.transform_point3(Vec3::Z * ORTHO_EYE_DISTANCE)
        }
    }

    /// Pixel rectangle covered by `bounds` in a `width` x `height` viewport.
    ///
    /// Returns `None` when the box projects outside the viewport. A box that
    /// straddles the eye plane covers the whole viewport.
    pub fn project(&self, bounds: &Aabb, width: u32, height: u32) -> Option<ScreenRect> {
        let mvp = self.projection * self.modelview;
        let mut lo = Vec3::splat(f32::INFINITY);
        let mut hi = Vec3::splat(f32::NEG_INFINITY);

        for corner in bounds.corners() {
            let clip = mvp * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            if clip.w <= f32::EPSILON {
                return Some(ScreenRect::full(width, height));
            }
            let ndc = clip.truncate() / clip.w;
            lo = lo.min(ndc);
            hi = hi.max(ndc);
        }

        if hi.x < -1.0 || lo.x > 1.0 || hi.y < -1.0 || lo.y > 1.0 {
            return None;
        }

        let (w, h) = (width as f32, height as f32);
        let x0 = ((lo.x.max(-1.0) + 1.0) * 0.5 * w).floor();
        let x1 = ((hi.x.min(1.0) + 1.0) * 0.5 * w).ceil();
        // NDC +Y points up, rows grow downwards.
        let y0 = ((1.0 - hi.y.min(1.0)) * 0.5 * h).floor();
        let y1 = ((1.0 - lo.y.max(-1.0)) * 0.5 * h).ceil();

        let rect = ScreenRect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32)
            .clip(width, height);
        (!rect.is_empty()).then_some(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aabb_split_halves_tile_box() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0));
        let (lower, upper) = aabb.split(Axis::X, 1.0);
        assert_eq!(lower, Aabb::new(Vec3::ZERO, Vec3::ONE));
        assert_eq!(upper, Aabb::new(Vec3::X, Vec3::new(2.0, 1.0, 1.0)));
        assert!(lower.intersection(&upper).is_none());
        assert_relative_eq!(lower.volume() + upper.volume(), aabb.volume());
    }

    #[test]
    fn longest_axis_prefers_lower_axis_on_tie() {
        assert_eq!(Aabb::new(Vec3::ZERO, Vec3::ONE).longest_axis(), Axis::X);
        assert_eq!(
            Aabb::new(Vec3::ZERO, Vec3::new(1.0, 3.0, 3.0)).longest_axis(),
            Axis::Y
        );
        assert_eq!(
            Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 3.0)).longest_axis(),
            Axis::Z
        );
    }

    #[test]
    fn degenerate_boxes_are_not_solid() {
        assert!(Aabb::new(Vec3::ZERO, Vec3::ONE).is_solid());
        assert!(!Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)).is_solid());
        assert!(!Aabb::new(Vec3::ZERO, Vec3::new(f32::NAN, 1.0, 1.0)).is_solid());
    }

    #[test]
    fn screen_rect_clip() {
        let rect = ScreenRect::new(-4, 2, 10, 20);
        assert_eq!(rect.clip(8, 8), ScreenRect::new(0, 2, 6, 6));
        assert!(ScreenRect::new(10, 10, 4, 4).clip(8, 8).is_empty());
    }

    #[test]
    fn perspective_eye_is_camera_position() {
        let eye = Vec3::new(3.0, -2.0, 7.0);
        let view = ViewState::new(
            Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0),
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
        );
        assert!(view.is_perspective());
        let recovered = view.eye_position();
        assert_relative_eq!(recovered.x, eye.x, epsilon = 1e-4);
        assert_relative_eq!(recovered.y, eye.y, epsilon = 1e-4);
        assert_relative_eq!(recovered.z, eye.z, epsilon = 1e-4);
    }

    #[test]
    fn orthographic_eye_lies_behind_view_plane() {
        let view = ViewState::new(
            Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            Mat4::look_at_rh(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, Vec3::Y),
        );
        assert!(!view.is_perspective());
        let eye = view.eye_position();
        assert!(eye.x > 1000.0);
    }

    #[test]
    fn project_centered_box_covers_middle_of_viewport() {
        let view = ViewState::new(
            Mat4::orthographic_rh(-2.0, 2.0, -2.0, 2.0, 0.1, 10.0),
            Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y),
        );
        let rect = view
            .project(&Aabb::new(Vec3::splat(-1.0), Vec3::ONE), 100, 100)
            .unwrap();
        assert_eq!(rect, ScreenRect::new(25, 25, 50, 50));
    }

    #[test]
    fn project_offscreen_box_is_none() {
        let view = ViewState::new(
            Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y),
        );
        let far_right = Aabb::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 1.0, 1.0));
        assert!(view.project(&far_right, 64, 64).is_none());
    }
}
