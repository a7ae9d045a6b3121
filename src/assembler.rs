//! Ordering, validation and stacking of a decoded slice batch.

use ndarray::{Array3, s};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::slice::{self, RawSlice};
use crate::volume::{Volume, VolumeMetadata};

/// A single slice cannot form a volume.
pub const MIN_SLICES: usize = 2;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("not enough valid slices: found {found}, need at least {MIN_SLICES}")]
    InsufficientSlices { found: usize },

    #[error(
        "slice {index} has in-plane dimensions {found:?}, expected {expected:?}; \
         mixed-dimension batches are rejected rather than cropped"
    )]
    MismatchedDimensions {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Decode every payload, order the survivors along the primary axis and
/// stack them into a volume with its derived metadata.
///
/// Individual decode failures are logged and skipped; the batch as a whole
/// fails only when fewer than [`MIN_SLICES`] slices survive or their
/// in-plane dimensions disagree. The sort is stable, so slices with equal
/// ordering keys keep their submission order.
pub fn assemble(payloads: &[Vec<u8>]) -> Result<(Volume, VolumeMetadata), AssembleError> {
    let mut slices: Vec<RawSlice> = payloads
        .par_iter()
        .enumerate()
        .filter_map(|(index, payload)| match slice::decode_slice(payload) {
            Ok(slice) => Some(slice),
            Err(error) => {
                warn!(index, %error, "skipping undecodable slice payload");
                None
            }
        })
        .collect();

    if slices.len() < MIN_SLICES {
        return Err(AssembleError::InsufficientSlices {
            found: slices.len(),
        });
    }

    slices.sort_by(|a, b| {
        a.position
            .partial_cmp(&b.position)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let data = stack(&slices)?;
    let metadata = derive_metadata(&slices[0], &data);
    debug!(
        depth = metadata.depth,
        height = metadata.height,
        width = metadata.width,
        "assembled slice batch into volume"
    );
    Ok((Volume::new(data), metadata))
}

fn stack(slices: &[RawSlice]) -> Result<Array3<f32>, AssembleError> {
    let expected = slices[0].pixels.dim();
    for (index, slice) in slices.iter().enumerate() {
        if slice.pixels.dim() != expected {
            return Err(AssembleError::MismatchedDimensions {
                index,
                expected,
                found: slice.pixels.dim(),
            });
        }
    }

    let (height, width) = expected;
    let mut data = Array3::<f32>::zeros((slices.len(), height, width));
    for (i, slice) in slices.iter().enumerate() {
        data.slice_mut(s![i, .., ..]).assign(&slice.pixels);
    }
    Ok(data)
}

/// Metadata comes from the first slice in sort order only; later slices'
/// attributes are ignored. Without an explicit source window the default is
/// a heuristic contrast stretch over the whole volume (mean intensity,
/// four standard deviations wide) with no clinical authority behind it.
fn derive_metadata(first: &RawSlice, data: &Array3<f32>) -> VolumeMetadata {
    let (depth, height, width) = data.dim();
    let (window_center, window_width) = match first.meta.window {
        Some(window) => (window.center, window.width),
        None => (data.mean().unwrap_or(0.0), data.std(0.0) * 4.0),
    };
    VolumeMetadata {
        depth,
        height,
        width,
        slice_thickness: first.meta.slice_thickness,
        pixel_spacing: first.meta.pixel_spacing,
        window_center,
        window_width,
        modality: first.meta.modality.clone(),
        series_description: first.meta.series_description.clone(),
        body_part_examined: first.meta.body_part_examined.clone(),
        study_date: first.meta.study_date,
    }
}
