//! Brick rendering capability.

use glam::Vec4;
use volcast_core::{Brick, FrameImage, Result, ViewState};
use volcast_net::RenderState;

/// Renders a participant's bricks into a partial image.
///
/// Implementations own all of their rendering resources. The returned image
/// is premultiplied RGBA8 placed in the coordinator's framebuffer; its
/// participant index and frame number are overwritten downstream.
pub trait BrickRenderer: Send {
    /// Render `bricks` (the bricks of the current time step) as seen from
    /// `view` with the parameters in `state`.
    fn render(&mut self, state: &RenderState, view: &ViewState, bricks: &[Brick])
        -> Result<FrameImage>;
}

impl<T: BrickRenderer + ?Sized> BrickRenderer for Box<T> {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> Result<FrameImage> {
        (**self).render(state, view, bricks)
    }
}

/// Fills the screen footprint of its bricks with one translucent color.
#[derive(Clone, Copy, Debug)]
pub struct FlatRenderer {
    color: Vec4,
    depth: bool,
}

impl FlatRenderer {
    /// `color` is straight (not premultiplied) RGBA in `[0, 1]`.
    pub const fn new(color: Vec4) -> Self {
        Self {
            color,
            depth: false,
        }
    }

    /// Also emit a constant depth channel: the distance from the eye to the
    /// centre of the bricks.
    pub const fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }

    /// Premultiplied output color for the given parameters.
    pub fn premultiplied(&self, state: &RenderState) -> [u8; 4] {
        let opacity = state
            .transfer_function
            .as_ref()
            .filter(|tf| !tf.is_empty())
            .map_or(1.0, volcast_core::TransferFunction::mean_opacity);
        let alpha = (self.color.w * opacity).clamp(0.0, 1.0);
        let rgb = self.color.truncate().clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * alpha;
        let to_u8 = |c: f32| (c * 255.0).round() as u8;
        [to_u8(rgb.x), to_u8(rgb.y), to_u8(rgb.z), to_u8(alpha)]
    }
}

impl BrickRenderer for FlatRenderer {
    fn render(
        &mut self,
        state: &RenderState,
        view: &ViewState,
        bricks: &[Brick],
    ) -> Result<FrameImage> {
        let width = u32::try_from(state.width).unwrap_or(0);
        let height = u32::try_from(state.height).unwrap_or(0);
        let Some(first) = bricks.first() else {
            return Ok(FrameImage::empty(0));
        };
        let bounds = bricks
            .iter()
            .fold(first.bounds, |acc, brick| acc.merge(&brick.bounds));

        let Some(rect) = view.project(&bounds, width, height) else {
            return Ok(FrameImage::empty(0));
        };

        let mut image = FrameImage::filled(0, rect, self.premultiplied(state));
        if self.depth {
            let distance = view.eye_position().distance(bounds.center());
            image.depth = Some(vec![distance; rect.area()]);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use volcast_core::{Aabb, ControlPoint, ScreenRect, TransferFunction};

    fn state(width: i32, height: i32) -> RenderState {
        RenderState {
            width,
            height,
            ..RenderState::default()
        }
    }

    fn brick() -> Brick {
        Brick::new(Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)), 0, 0)
    }

    #[test]
    fn identity_view_covers_projected_box() {
        let mut renderer = FlatRenderer::new(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let image = renderer
            .render(&state(4, 4), &ViewState::default(), &[brick()])
            .unwrap();
        // [-0.5, 0.5] in NDC is the middle half of the viewport.
        assert_eq!(image.rect, ScreenRect::new(1, 1, 2, 2));
        assert_eq!(image.pixel(0, 0), [255, 0, 0, 255]);
        assert!(image.depth.is_none());
    }

    #[test]
    fn output_is_premultiplied() {
        let renderer = FlatRenderer::new(Vec4::new(1.0, 1.0, 0.0, 0.5));
        assert_eq!(renderer.premultiplied(&state(1, 1)), [128, 128, 0, 128]);
    }

    #[test]
    fn opacity_follows_transfer_function() {
        let renderer = FlatRenderer::new(Vec4::ONE);
        let tf = TransferFunction::new(vec![
            ControlPoint::new(0.0, Vec4::new(1.0, 1.0, 1.0, 0.0)),
            ControlPoint::new(1.0, Vec4::new(1.0, 1.0, 1.0, 0.0)),
        ])
        .unwrap();
        let state = RenderState {
            transfer_function: Some(tf),
            ..state(1, 1)
        };
        assert_eq!(renderer.premultiplied(&state), [0, 0, 0, 0]);
    }

    #[test]
    fn nothing_to_draw_yields_empty_image() {
        let mut renderer = FlatRenderer::new(Vec4::ONE);
        let image = renderer
            .render(&state(8, 8), &ViewState::default(), &[])
            .unwrap();
        assert!(image.rect.is_empty());

        let away = ViewState::new(Mat4::IDENTITY, Mat4::from_translation(Vec3::X * 10.0));
        let image = renderer.render(&state(8, 8), &away, &[brick()]).unwrap();
        assert!(image.rect.is_empty());
    }

    #[test]
    fn depth_channel_matches_rect() {
        let mut renderer = FlatRenderer::new(Vec4::ONE).with_depth(true);
        let image = renderer
            .render(&state(4, 4), &ViewState::default(), &[brick()])
            .unwrap();
        assert!(image.validate().is_ok());
        assert_eq!(image.depth.as_ref().map(Vec::len), Some(image.rect.area()));
    }
}
