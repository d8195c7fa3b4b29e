//! Order-correct compositing of partial images.

use std::path::Path;

use glam::Vec4;
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;
use volcast_core::FrameImage;
use volcast_partition::TraversalOrder;

/// Order in which images are handed to [`Compositor::composite`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositeOrder {
    /// Farthest first, blended with "over".
    #[default]
    BackToFront,
    /// Nearest first, blended with "under"; saturated pixels are skipped.
    FrontToBack,
}

impl CompositeOrder {
    /// Tree traversal producing images in this order.
    pub const fn traversal(self) -> TraversalOrder {
        match self {
            Self::BackToFront => TraversalOrder::BackToFront,
            Self::FrontToBack => TraversalOrder::FrontToBack,
        }
    }
}

/// Linear premultiplied RGBA pixels, row 0 at the top, with an optional
/// depth plane holding the nearest visible sample per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
    depth: Option<Vec<f32>>,
}

impl Framebuffer {
    /// Transparent framebuffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
            depth: None,
        }
    }

    /// Transparent framebuffer with a depth plane at infinity.
    pub fn with_depth(width: u32, height: u32) -> Self {
        let mut fb = Self::new(width, height);
        fb.enable_depth();
        fb
    }

    fn enable_depth(&mut self) {
        if self.depth.is_none() {
            self.depth = Some(vec![f32::INFINITY; self.pixels.len()]);
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Change dimensions; contents become transparent.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize, Vec4::ZERO);
        if let Some(depth) = &mut self.depth {
            depth.clear();
            depth.resize(self.pixels.len(), f32::INFINITY);
        }
    }

    /// Fill with `color` and reset depth to infinity.
    pub fn clear(&mut self, color: Vec4) {
        self.pixels.fill(color);
        if let Some(depth) = &mut self.depth {
            depth.fill(f32::INFINITY);
        }
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    /// Nearest depth per pixel, `None` unless depth compositing is enabled.
    /// Pixels no image covered hold infinity.
    pub fn depth(&self) -> Option<&[f32]> {
        self.depth.as_deref()
    }

    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.depth
            .as_ref()
            .map(|d| d[y as usize * self.width as usize + x as usize])
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Quantize to 8 bits per channel.
    pub fn to_rgba8(&self) -> RgbaImage {
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let p = self.pixel(x, y);
            Rgba([to_u8(p.x), to_u8(p.y), to_u8(p.z), to_u8(p.w)])
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
        self.to_rgba8().save(path)
    }

    fn rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [Vec4])> {
        self.pixels
            .par_chunks_mut(self.width.max(1) as usize)
            .enumerate()
    }
}

#[inline]
fn unpack(rgba: [u8; 4]) -> Vec4 {
    Vec4::new(
        f32::from(rgba[0]),
        f32::from(rgba[1]),
        f32::from(rgba[2]),
        f32::from(rgba[3]),
    ) / 255.0
}

/// Blends partial images into a framebuffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compositor {
    order: CompositeOrder,
    depth: bool,
}

impl Compositor {
    pub const fn new(order: CompositeOrder) -> Self {
        Self {
            order,
            depth: false,
        }
    }

    /// Also merge image depth into the framebuffer's depth plane.
    pub const fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }

    pub const fn order(&self) -> CompositeOrder {
        self.order
    }

    pub const fn composites_depth(&self) -> bool {
        self.depth
    }

    /// Composite `images`, given in this compositor's order, over
    /// `background`.
    ///
    /// Images are placed at their rectangles and clipped to the framebuffer.
    pub fn composite<'a, I>(&self, target: &mut Framebuffer, background: Vec4, images: I)
    where
        I: IntoIterator<Item = &'a FrameImage>,
    {
        if self.depth {
            target.enable_depth();
        }
        match self.order {
            CompositeOrder::BackToFront => {
                target.clear(background);
                for image in images {
                    blend(target, image, |dst, src| src + dst * (1.0 - src.w));
                    if self.depth {
                        merge_depth(target, image);
                    }
                }
            }
            CompositeOrder::FrontToBack => {
                target.clear(Vec4::ZERO);
                for image in images {
                    blend(target, image, |dst, src| {
                        if dst.w >= 1.0 {
                            dst
                        } else {
                            dst + src * (1.0 - dst.w)
                        }
                    });
                    if self.depth {
                        merge_depth(target, image);
                    }
                }
                target
                    .pixels
                    .par_iter_mut()
                    .for_each(|dst| *dst += background * (1.0 - dst.w));
            }
        }
    }
}

fn blend<F>(target: &mut Framebuffer, image: &FrameImage, op: F)
where
    F: Fn(Vec4, Vec4) -> Vec4 + Sync,
{
    let clipped = image.rect.clip(target.width, target.height);
    if clipped.is_empty() || image.color.len() != image.rect.area() * 4 {
        return;
    }

    let src_width = image.rect.width as usize;
    let x0 = clipped.x as usize;
    let x1 = x0 + clipped.width as usize;
    let y0 = clipped.y as usize;
    let pixels = image.pixels();
    // Offsets of the clipped region inside the source image.
    let dx = (clipped.x - image.rect.x) as usize;
    let dy = (clipped.y - image.rect.y) as usize;

    target
        .rows_mut()
        .skip(y0)
        .take(clipped.height as usize)
        .for_each(|(y, row)| {
            let src_row = &pixels[(y - y0 + dy) * src_width..][..src_width];
            for (x, dst) in row[x0..x1].iter_mut().enumerate() {
                *dst = op(*dst, unpack(src_row[dx + x]));
            }
        });
}

/// Keep the nearer of the framebuffer depth and the image depth wherever
/// the image has a visible sample.
fn merge_depth(target: &mut Framebuffer, image: &FrameImage) {
    let Some(src_depth) = image.depth.as_deref() else {
        return;
    };
    let clipped = image.rect.clip(target.width, target.height);
    let area = image.rect.area();
    if clipped.is_empty() || image.color.len() != area * 4 || src_depth.len() != area {
        return;
    }
    let width = target.width.max(1) as usize;
    let Some(depth) = target.depth.as_mut() else {
        return;
    };

    let src_width = image.rect.width as usize;
    let x0 = clipped.x as usize;
    let x1 = x0 + clipped.width as usize;
    let y0 = clipped.y as usize;
    let dx = (clipped.x - image.rect.x) as usize;
    let dy = (clipped.y - image.rect.y) as usize;
    let pixels = image.pixels();

    depth
        .par_chunks_mut(width)
        .enumerate()
        .skip(y0)
        .take(clipped.height as usize)
        .for_each(|(y, row)| {
            let offset = (y - y0 + dy) * src_width + dx;
            for (x, dst) in row[x0..x1].iter_mut().enumerate() {
                if pixels[offset + x][3] > 0 {
                    *dst = dst.min(src_depth[offset + x]);
                }
            }
        });
}
