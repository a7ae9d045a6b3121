use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// One of the three canonical orthogonal viewing orientations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Axial,
    Coronal,
    Sagittal,
}

/// Per-plane extraction geometry. Adding a plane means adding a table row,
/// not duplicating extraction branches.
pub(crate) struct PlaneGeometry {
    /// Volume axis walked by the slice index, in (depth, height, width).
    pub(crate) axis: Axis,
    /// Whether the cross-section is flipped to anatomical top-up.
    pub(crate) flip_vertical: bool,
    /// (vertical, horizontal) indices into the (thickness, row, column)
    /// spacing triple; `None` means the cross-section needs no aspect
    /// correction (in-plane spacings are treated as already matched).
    pub(crate) spacing_pair: Option<(usize, usize)>,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Axial, Plane::Coronal, Plane::Sagittal];

    pub fn name(self) -> &'static str {
        match self {
            Plane::Axial => "axial",
            Plane::Coronal => "coronal",
            Plane::Sagittal => "sagittal",
        }
    }

    pub fn from_name(name: &str) -> Option<Plane> {
        match name {
            "axial" => Some(Plane::Axial),
            "coronal" => Some(Plane::Coronal),
            "sagittal" => Some(Plane::Sagittal),
            _ => None,
        }
    }

    pub(crate) fn geometry(self) -> PlaneGeometry {
        match self {
            Plane::Axial => PlaneGeometry {
                axis: Axis(0),
                flip_vertical: false,
                spacing_pair: None,
            },
            // Coronal cross-sections are (depth, width): vertical extent is
            // the primary axis, horizontal spacing comes from the columns.
            Plane::Coronal => PlaneGeometry {
                axis: Axis(1),
                flip_vertical: true,
                spacing_pair: Some((0, 2)),
            },
            // Sagittal cross-sections are (depth, height): horizontal
            // spacing comes from the rows.
            Plane::Sagittal => PlaneGeometry {
                axis: Axis(2),
                flip_vertical: true,
                spacing_pair: Some((0, 1)),
            },
        }
    }

    /// Stretch factor for the vertical (primary) axis of an extracted
    /// cross-section, given the (thickness, row, column) spacing triple.
    pub(crate) fn vertical_scale(self, spacing: [f32; 3]) -> f32 {
        match self.geometry().spacing_pair {
            Some((vertical, horizontal)) => spacing[vertical] / spacing[horizontal],
            None => 1.0,
        }
    }
}

/// Processing state of the external case aggregate. The engine only ever
/// writes these through a [`StatusSink`](crate::StatusSink); persistence is
/// the collaborator's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    SampleReceived,
    Processing,
    AwaitingReview,
}
