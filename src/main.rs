use std::sync::Arc;
use std::{env, fs};

use mpr_volume::{CaseId, CaseStatus, MprEngine, StatusSink, VolumeStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct LogSink;

impl StatusSink for LogSink {
    fn update(&self, case: CaseId, status: CaseStatus) {
        info!(%case, ?status, "case status changed");
    }
}

/// Assemble every .dcm file in a directory (default "dicom") as case 1 and
/// write the volume plus the three canonical previews under "media".
#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let dir = env::args().nth(1).unwrap_or_else(|| "dicom".into());
    let payloads: Vec<Vec<u8>> = fs::read_dir(&dir)
        .expect("should have read the slice directory")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .filter_map(|path| fs::read(path).ok())
        .collect();

    let engine = Arc::new(MprEngine::new(VolumeStore::new("media")));
    let report = engine
        .submit(
            CaseId(1),
            CaseStatus::SampleReceived,
            payloads,
            Arc::new(LogSink),
        )
        .await
        .expect("assembly task should not panic")
        .expect("batch should have assembled into a volume");

    info!(
        depth = report.metadata.depth,
        height = report.metadata.height,
        width = report.metadata.width,
        window_center = report.metadata.window_center,
        window_width = report.metadata.window_width,
        axial = %report.previews.axial.display(),
        coronal = %report.previews.coronal.display(),
        sagittal = %report.previews.sagittal.display(),
        "case ready for review"
    );
}
