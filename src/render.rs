//! Rendering adapters: windowed cross-sections to grayscale PNG bytes, and
//! downsampled flat intensity buffers for client-side volume rendering.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, ImageFormat, Luma};
use ndarray::{Array2, s};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

use crate::volume::{Volume, VolumeMetadata};
use crate::windowing::{self, Window};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("slice dimensions do not form a valid image buffer")]
    InvalidBuffer,

    #[error("subsampling stride must be at least 1")]
    InvalidStride,

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Encode a windowed cross-section as an 8-bit grayscale PNG.
///
/// `vertical_scale` is the primary-axis stretch factor from the plane's
/// spacing pair; when it differs from 1 the image height is resampled with
/// Lanczos3 so anatomy keeps its physical aspect ratio.
pub fn encode_slice_png(section: &Array2<u8>, vertical_scale: f32) -> Result<Vec<u8>, RenderError> {
    let (height, width) = section.dim();
    let raw: Vec<u8> = section.iter().copied().collect();
    let mut image = ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width as u32, height as u32, raw)
        .ok_or(RenderError::InvalidBuffer)?;

    if (vertical_scale - 1.0).abs() > f32::EPSILON {
        let scaled_height = (height as f32 * vertical_scale) as u32;
        if scaled_height > 0 {
            image = imageops::resize(&image, width as u32, scaled_height, FilterType::Lanczos3);
        }
    }

    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Flattened windowed intensities plus the geometry a renderer needs.
#[derive(Clone, Debug, Serialize)]
pub struct VolumePayload {
    /// Depth-major, then row, then column order.
    pub data: Vec<u8>,
    /// (depth, height, width) after downsampling.
    pub dimensions: [usize; 3],
    /// (thickness, row, column) spacing. Deliberately not rescaled by the
    /// downsampling stride; render-side consumers apply their own scale.
    pub spacing: [f32; 3],
}

/// Subsample the volume by `stride` along all three axes (strided pick, not
/// averaging, as a transfer-size tradeoff), window it and flatten. A stride
/// of zero is rejected rather than handed to the slicing macro, which would
/// panic.
pub fn volume_payload(
    volume: &Volume,
    metadata: &VolumeMetadata,
    stride: usize,
    window: Window,
) -> Result<VolumePayload, RenderError> {
    if stride == 0 {
        return Err(RenderError::InvalidStride);
    }
    let step = stride as isize;
    let subsampled = volume.data().slice(s![..;step, ..;step, ..;step]);
    let windowed = windowing::apply_window(subsampled, Some(window));
    let (depth, height, width) = windowed.dim();
    Ok(VolumePayload {
        data: windowed.iter().copied().collect(),
        dimensions: [depth, height, width],
        spacing: metadata.spacing(),
    })
}
