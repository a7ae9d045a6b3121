//! Durable artifacts for a case: the raw volume array (NPY, exact f32
//! round-trip) and the three canonical preview rasters, keyed by case id
//! and replaced wholesale on reprocessing.

use ndarray::Array3;
use ndarray_npy::{ReadNpyError, WriteNpyError, read_npy, write_npy};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::CaseId;
use crate::enums::Plane;
use crate::volume::Volume;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("volume artifact unreadable: {0}")]
    Read(#[from] ReadNpyError),

    #[error("volume artifact not writable: {0}")]
    Write(#[from] WriteNpyError),
}

pub struct VolumeStore {
    root: PathBuf,
}

impl VolumeStore {
    /// A store rooted at a media directory; artifacts land in
    /// `dicom_volumes/` and `dicom_previews/` beneath it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn volume_path(&self, case: CaseId) -> PathBuf {
        self.root
            .join("dicom_volumes")
            .join(format!("volume_{case}.npy"))
    }

    pub fn preview_path(&self, case: CaseId, plane: Plane) -> PathBuf {
        self.root
            .join("dicom_previews")
            .join(format!("{}_{case}.png", plane.name()))
    }

    /// Persist the volume array, replacing any previous run's artifact.
    pub fn save_volume(&self, case: CaseId, volume: &Volume) -> Result<(), StoreError> {
        let path = self.volume_path(case);
        ensure_parent(&path)?;
        write_npy(&path, volume.data())?;
        Ok(())
    }

    /// Load a case's volume. `Ok(None)` means the case has no volume yet;
    /// that is a normal answer, not an error.
    pub fn load_volume(&self, case: CaseId) -> Result<Option<Volume>, StoreError> {
        let path = self.volume_path(case);
        if !path.exists() {
            return Ok(None);
        }
        let data: Array3<f32> = read_npy(&path)?;
        Ok(Some(Volume::new(data)))
    }

    pub fn save_preview(
        &self,
        case: CaseId,
        plane: Plane,
        png: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.preview_path(case, plane);
        ensure_parent(&path)?;
        fs::write(&path, png)?;
        Ok(path)
    }
}

fn ensure_parent(path: &Path) -> Result<(), io::Error> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}
