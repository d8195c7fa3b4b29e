//! Transfer functions mapping scalar values to color and opacity.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A color/opacity sample at a normalized scalar value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Scalar value in `[0, 1]`
    pub value: f32,
    /// Straight (non-premultiplied) RGBA
    pub color: Vec4,
}

impl ControlPoint {
    #[inline]
    pub const fn new(value: f32, color: Vec4) -> Self {
        Self { value, color }
    }
}

/// Piecewise-linear transfer function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    points: Vec<ControlPoint>,
    /// Number of discrete color steps (0 for smooth interpolation)
    discrete_colors: u32,
}

impl TransferFunction {
    /// Create a transfer function from control points.
    ///
    /// Points are sorted by value; values must be finite and within `[0, 1]`.
    pub fn new(mut points: Vec<ControlPoint>) -> Result<Self> {
        if let Some(bad) = points
            .iter()
            .find(|p| !p.value.is_finite() || !(0.0..=1.0).contains(&p.value))
        {
            return Err(Error::InvalidData(format!(
                "control point value {} outside [0, 1]",
                bad.value
            )));
        }
        points.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Self {
            points,
            discrete_colors: 0,
        })
    }

    /// Grayscale ramp from transparent black to opaque white.
    pub fn grayscale_ramp() -> Self {
        Self {
            points: vec![
                ControlPoint::new(0.0, Vec4::ZERO),
                ControlPoint::new(1.0, Vec4::ONE),
            ],
            discrete_colors: 0,
        }
    }

    /// Quantize colors into `steps` bands (0 disables quantization).
    pub fn with_discrete_colors(mut self, steps: u32) -> Self {
        self.discrete_colors = steps;
        self
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn discrete_colors(&self) -> u32 {
        self.discrete_colors
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Straight RGBA at scalar `value`.
    pub fn evaluate(&self, value: f32) -> Vec4 {
        let value = if self.discrete_colors > 1 {
            let steps = self.discrete_colors as f32;
            ((value * steps).floor() / (steps - 1.0)).min(1.0)
        } else {
            value
        };

        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Vec4::ZERO;
        };
        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        let upper = self.points.partition_point(|p| p.value <= value);
        let (a, b) = (self.points[upper - 1], self.points[upper]);
        let span = b.value - a.value;
        if span <= f32::EPSILON {
            return b.color;
        }
        a.color.lerp(b.color, (value - a.value) / span)
    }

    /// Bake a lookup table of `width` entries covering `[0, 1]`.
    pub fn lut(&self, width: usize) -> Vec<Vec4> {
        match width {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            _ => (0..width)
                .map(|i| self.evaluate(i as f32 / (width - 1) as f32))
                .collect(),
        }
    }

    /// Average opacity over the scalar range.
    pub fn mean_opacity(&self) -> f32 {
        const SAMPLES: usize = 256;
        self.lut(SAMPLES).iter().map(|c| c.w).sum::<f32>() / SAMPLES as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn evaluate_interpolates_between_points() {
        let tf = TransferFunction::grayscale_ramp();
        let mid = tf.evaluate(0.25);
        assert_relative_eq!(mid.x, 0.25);
        assert_relative_eq!(mid.w, 0.25);
    }

    #[test]
    fn evaluate_clamps_outside_range() {
        let tf = TransferFunction::new(vec![
            ControlPoint::new(0.8, Vec4::ONE),
            ControlPoint::new(0.2, Vec4::new(1.0, 0.0, 0.0, 0.5)),
        ])
        .unwrap();
        assert_eq!(tf.evaluate(0.0), Vec4::new(1.0, 0.0, 0.0, 0.5));
        assert_eq!(tf.evaluate(1.0), Vec4::ONE);
    }

    #[test]
    fn new_rejects_out_of_range_values() {
        assert!(TransferFunction::new(vec![ControlPoint::new(1.5, Vec4::ONE)]).is_err());
    }

    #[test]
    fn discrete_colors_quantize() {
        let tf = TransferFunction::grayscale_ramp().with_discrete_colors(2);
        assert_eq!(tf.evaluate(0.3), Vec4::ZERO);
        assert_eq!(tf.evaluate(0.7), Vec4::ONE);
    }

    #[test]
    fn lut_endpoints() {
        let lut = TransferFunction::grayscale_ramp().lut(5);
        assert_eq!(lut.len(), 5);
        assert_eq!(lut[0], Vec4::ZERO);
        assert_eq!(lut[4], Vec4::ONE);
        assert_relative_eq!(lut[2].y, 0.5);
    }

    #[test]
    fn empty_function_is_transparent() {
        assert_eq!(TransferFunction::default().evaluate(0.5), Vec4::ZERO);
        assert_relative_eq!(TransferFunction::default().mean_opacity(), 0.0);
    }
}
