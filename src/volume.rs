use chrono::NaiveDate;
use ndarray::{Array2, Array3, Axis};
use serde::Serialize;

use crate::enums::Plane;
use crate::windowing::Window;

/// A dense stack of ordered slices, shape (depth, height, width) with depth
/// along the primary acquisition axis. Immutable once assembled; a re-upload
/// regenerates the whole volume, never patches it.
#[derive(Debug)]
pub struct Volume {
    data: Array3<f32>,
}

impl Volume {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Valid index range for a plane: depth for axial, height for coronal,
    /// width for sagittal.
    pub fn extent(&self, plane: Plane) -> usize {
        self.data.len_of(plane.geometry().axis)
    }

    /// Extract the cross-section at `index`, flipped to anatomical top-up
    /// where the plane's geometry calls for it. `None` when the index is
    /// out of range; never clamped to a best-effort neighbour.
    pub fn plane_slice(&self, plane: Plane, index: usize) -> Option<Array2<f32>> {
        let geometry = plane.geometry();
        if index >= self.data.len_of(geometry.axis) {
            return None;
        }
        let mut section = self.data.index_axis(geometry.axis, index).to_owned();
        if geometry.flip_vertical {
            section.invert_axis(Axis(0));
        }
        Some(section)
    }
}

/// Aggregate geometry and display defaults derived from an assembled
/// volume, written back onto the owning case by the collaborator.
#[derive(Clone, Debug, Serialize)]
pub struct VolumeMetadata {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
    pub slice_thickness: Option<f32>,
    /// (row spacing, column spacing) in mm.
    pub pixel_spacing: Option<(f32, f32)>,
    pub window_center: f32,
    pub window_width: f32,
    pub modality: Option<String>,
    pub series_description: Option<String>,
    pub body_part_examined: Option<String>,
    pub study_date: Option<NaiveDate>,
}

impl VolumeMetadata {
    /// (thickness, row, column) spacing triple. Unknown spacings fall back
    /// to 1.0 so aspect arithmetic always has a value to work with.
    pub fn spacing(&self) -> [f32; 3] {
        let (row, column) = self.pixel_spacing.unwrap_or((1.0, 1.0));
        [self.slice_thickness.unwrap_or(1.0), row, column]
    }

    /// The case's default display window.
    pub fn window(&self) -> Window {
        Window::new(self.window_center, self.window_width)
    }
}
