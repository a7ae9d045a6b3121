//! Intensity windowing: mapping a chosen sub-range of raw values to the
//! full displayable 8-bit range.
//!
//! Preview generation, per-request slice serving and the volume-buffer path
//! all normalize through [`apply_window`], so the zero-width edge cases
//! behave identically everywhere.

use ndarray::{Array, ArrayView, Dimension};
use serde::{Deserialize, Serialize};

/// A display window: intensities inside `[center - width/2, center +
/// width/2]` are stretched to full contrast, values outside saturate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub center: f32,
    pub width: f32,
}

impl Window {
    pub fn new(center: f32, width: f32) -> Self {
        Self { center, width }
    }

    fn bounds(self) -> (f32, f32) {
        (self.center - self.width / 2.0, self.center + self.width / 2.0)
    }
}

/// Map raw floating-point intensities to `u8`, preserving shape.
///
/// With an explicit window the input is clipped to the window bounds and
/// that range is rescaled linearly to `[0, 255]`. Without one, the array's
/// own observed min/max are used. A degenerate range (zero window width, or
/// a constant array) yields an all-zero output rather than dividing by
/// zero.
pub fn apply_window<D>(input: ArrayView<'_, f32, D>, window: Option<Window>) -> Array<u8, D>
where
    D: Dimension,
{
    let (low, high) = match window {
        Some(window) => window.bounds(),
        None => observed_range(&input),
    };
    if !(high > low) {
        return Array::zeros(input.raw_dim());
    }
    let scale = 255.0 / (high - low);
    input.map(|&value| ((value.clamp(low, high) - low) * scale) as u8)
}

fn observed_range<D>(input: &ArrayView<'_, f32, D>) -> (f32, f32)
where
    D: Dimension,
{
    let mut low = f32::INFINITY;
    let mut high = f32::NEG_INFINITY;
    for &value in input.iter() {
        low = low.min(value);
        high = high.max(value);
    }
    (low, high)
}
