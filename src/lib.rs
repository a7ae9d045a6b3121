//! # mpr-volume
//!
//! A multiplanar reconstruction (MPR) engine for DICOM slice batches.
//!
//! The crate takes an unordered bag of single-slice DICOM payloads for a
//! case, orders them along the primary acquisition axis, stacks them into a
//! dense 3D volume and persists that volume as an NPY artifact. From the
//! assembled volume it derives three canonical preview rasters and serves
//! any plane/index/window combination in the three medical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! Coronal and sagittal cross-sections are flipped to the anatomical top-up
//! convention and resampled along the primary axis when the slice thickness
//! differs from the in-plane pixel spacing, so non-cubic voxels do not show
//! up as squashed or stretched anatomy. A downsampled flat intensity buffer
//! can be produced instead of a raster for client-side volume rendering.
//!
//! The surrounding application owns the case records; it hands the engine a
//! [`CaseId`], its current [`CaseStatus`] and a [`StatusSink`] callback, and
//! receives a [`CaseReport`] (dimensions, spacing, window defaults, preview
//! paths) or a specific error back. Assembly runs on a background blocking
//! task; serving is synchronous and read-only.
//!
//! # Examples
//!
//! Assemble a batch of payloads and fetch a windowed coronal view:
//!
//! ```no_run
//! # use mpr_volume::{CaseId, MprEngine, Plane, VolumeStore};
//! let engine = MprEngine::new(VolumeStore::new("media"));
//! let payloads: Vec<Vec<u8>> = vec![/* raw DICOM bytes per slice */];
//! let report = engine
//!     .assemble_case(CaseId(17), &payloads)
//!     .expect("batch should assemble");
//! let png = engine
//!     .serve_slice(
//!         CaseId(17),
//!         &report.metadata,
//!         Plane::Coronal,
//!         report.metadata.height / 2,
//!         None,
//!     )
//!     .expect("slice should render");
//! ```

pub mod assembler;
pub mod engine;
pub mod enums;
pub mod render;
pub mod slice;
pub mod store;
pub mod volume;
pub mod windowing;

pub use assembler::AssembleError;
pub use engine::{CaseId, CaseReport, EngineError, MprEngine, PreviewSet, RequestError, StatusSink};
pub use enums::{CaseStatus, Plane};
pub use render::VolumePayload;
pub use slice::RawSlice;
pub use store::{StoreError, VolumeStore};
pub use volume::{Volume, VolumeMetadata};
pub use windowing::Window;
