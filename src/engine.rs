//! Case-facing orchestration: background assembly with explicit status
//! callbacks, preview generation and the synchronous serving paths.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::assembler::{self, AssembleError};
use crate::enums::{CaseStatus, Plane};
use crate::render::{self, RenderError, VolumePayload};
use crate::store::{StoreError, VolumeStore};
use crate::volume::{Volume, VolumeMetadata};
use crate::windowing::{self, Window};

/// Identity of the external case aggregate that owns a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback through which the engine writes case processing state. The
/// surrounding application persists it however it likes; the engine only
/// guarantees the ordering: `Processing` before assembly starts, a terminal
/// state when it finishes.
pub trait StatusSink: Send + Sync {
    fn update(&self, case: CaseId, status: CaseStatus);
}

/// Batch-level failures during assembly and persistence.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Rejections on the serving path. These never change case state.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown plane selector {0:?}, expected axial, coronal or sagittal")]
    UnknownPlane(String),

    #[error("index {index} out of range for the {} plane (extent {extent})", .plane.name())]
    IndexOutOfRange {
        plane: Plane,
        index: usize,
        extent: usize,
    },

    #[error("no volume is available for case {case}")]
    VolumeNotAvailable { case: CaseId },

    #[error("downsampling stride must be at least 1")]
    InvalidDownsample,

    #[error("failed to render slice: {0}")]
    Render(#[from] RenderError),
}

/// Parse a plane selector from a request parameter.
pub fn parse_plane(name: &str) -> Result<Plane, RequestError> {
    Plane::from_name(name).ok_or_else(|| RequestError::UnknownPlane(name.to_string()))
}

/// Everything the collaborator writes back onto a case after a successful
/// assembly run.
#[derive(Debug, Serialize)]
pub struct CaseReport {
    pub metadata: VolumeMetadata,
    pub previews: PreviewSet,
}

/// Paths of the three persisted canonical preview rasters.
#[derive(Debug, Serialize)]
pub struct PreviewSet {
    pub axial: PathBuf,
    pub coronal: PathBuf,
    pub sagittal: PathBuf,
}

pub struct MprEngine {
    store: VolumeStore,
}

impl MprEngine {
    pub fn new(store: VolumeStore) -> Self {
        Self { store }
    }

    /// Assemble a batch synchronously: decode, order and stack the slices,
    /// persist the volume and generate the three canonical previews at the
    /// middle index of each plane.
    ///
    /// Nothing is persisted when assembly fails; a re-run replaces all
    /// artifacts of a previous run.
    pub fn assemble_case(
        &self,
        case: CaseId,
        payloads: &[Vec<u8>],
    ) -> Result<CaseReport, EngineError> {
        let (volume, metadata) = assembler::assemble(payloads)?;
        self.store.save_volume(case, &volume)?;

        let window = metadata.window();
        let previews = PreviewSet {
            axial: self.save_preview(case, &volume, &metadata, Plane::Axial, window)?,
            coronal: self.save_preview(case, &volume, &metadata, Plane::Coronal, window)?,
            sagittal: self.save_preview(case, &volume, &metadata, Plane::Sagittal, window)?,
        };
        info!(
            %case,
            depth = metadata.depth,
            height = metadata.height,
            width = metadata.width,
            modality = metadata.modality.as_deref().unwrap_or("unknown"),
            "case volume assembled"
        );
        Ok(CaseReport { metadata, previews })
    }

    /// Dispatch assembly as a background unit of work. The sink sees
    /// `Processing` before the task starts, `AwaitingReview` on success and
    /// the caller-supplied `prior` status again on failure, so a failed run
    /// never leaves the case stuck mid-flight. The caller may await the
    /// handle for the report or detach it.
    ///
    /// At most one in-flight assembly per case is assumed; callers
    /// serialize uploads at case granularity.
    pub fn submit(
        self: &Arc<Self>,
        case: CaseId,
        prior: CaseStatus,
        payloads: Vec<Vec<u8>>,
        sink: Arc<dyn StatusSink>,
    ) -> JoinHandle<Result<CaseReport, EngineError>> {
        sink.update(case, CaseStatus::Processing);
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = engine.assemble_case(case, &payloads);
            match &result {
                Ok(_) => sink.update(case, CaseStatus::AwaitingReview),
                Err(error) => {
                    warn!(%case, %error, "assembly failed, reverting case status");
                    sink.update(case, prior);
                }
            }
            result
        })
    }

    /// Render one plane/index of a ready case as grayscale PNG bytes,
    /// using the case's default window unless the request overrides it.
    pub fn serve_slice(
        &self,
        case: CaseId,
        metadata: &VolumeMetadata,
        plane: Plane,
        index: usize,
        window: Option<Window>,
    ) -> Result<Vec<u8>, RequestError> {
        let volume = self.load_ready_volume(case)?;
        let window = window.unwrap_or_else(|| metadata.window());
        render_section(&volume, metadata, plane, index, window)
    }

    /// Produce the downsampled flat intensity buffer for external volume
    /// rendering.
    pub fn serve_volume_payload(
        &self,
        case: CaseId,
        metadata: &VolumeMetadata,
        downsample: usize,
    ) -> Result<VolumePayload, RequestError> {
        if downsample == 0 {
            return Err(RequestError::InvalidDownsample);
        }
        let volume = self.load_ready_volume(case)?;
        Ok(render::volume_payload(
            &volume,
            metadata,
            downsample,
            metadata.window(),
        )?)
    }

    fn load_ready_volume(&self, case: CaseId) -> Result<Volume, RequestError> {
        match self.store.load_volume(case) {
            Ok(Some(volume)) => Ok(volume),
            Ok(None) => Err(RequestError::VolumeNotAvailable { case }),
            // A corrupt artifact surfaces as "not found" on the serving
            // path rather than crashing it.
            Err(error) => {
                warn!(%case, %error, "volume artifact unreadable");
                Err(RequestError::VolumeNotAvailable { case })
            }
        }
    }

    fn save_preview(
        &self,
        case: CaseId,
        volume: &Volume,
        metadata: &VolumeMetadata,
        plane: Plane,
        window: Window,
    ) -> Result<PathBuf, EngineError> {
        let index = volume.extent(plane) / 2;
        let png = render_section(volume, metadata, plane, index, window).map_err(|error| {
            match error {
                RequestError::Render(render) => EngineError::Render(render),
                // Middle indices are always within range for an assembled
                // volume; anything else is an invalid buffer.
                _ => EngineError::Render(RenderError::InvalidBuffer),
            }
        })?;
        Ok(self.store.save_preview(case, plane, &png)?)
    }
}

/// Shared by preview generation and per-request serving so both go through
/// the same windowing and aspect-correction contract.
fn render_section(
    volume: &Volume,
    metadata: &VolumeMetadata,
    plane: Plane,
    index: usize,
    window: Window,
) -> Result<Vec<u8>, RequestError> {
    let section = volume
        .plane_slice(plane, index)
        .ok_or(RequestError::IndexOutOfRange {
            plane,
            index,
            extent: volume.extent(plane),
        })?;
    let windowed = windowing::apply_window(section.view(), Some(window));
    let scale = plane.vertical_scale(metadata.spacing());
    Ok(render::encode_slice_png(&windowed, scale)?)
}
