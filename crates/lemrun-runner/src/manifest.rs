use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lemrun_core::{JobSpec, RunRecord};
use serde::{Deserialize, Serialize};

use crate::provenance::ProvenanceReport;

pub const RUN_RECORD_FILE: &str = "run_record.json";

/// Everything known about a run at launch time, written next to the staged driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(flatten)]
    pub record: RunRecord,
    pub job: JobSpec,
    pub staged_driver: PathBuf,
    pub driver_sha256: String,
    #[serde(default)]
    pub provenance: ProvenanceReport,
    pub created_at_unix: i64,
    pub launcher_version: String,
}

pub fn write_manifest(run_dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    let path = run_dir.join(RUN_RECORD_FILE);
    let bytes = serde_json::to_vec_pretty(manifest)?;
    std::fs::write(&path, bytes).with_context(|| format!("write run record {}", path.display()))?;
    Ok(path)
}

/// Accepts either the run directory or the record file itself.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    let file = if path.is_dir() { path.join(RUN_RECORD_FILE) } else { path.to_path_buf() };
    let bytes = std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
    let manifest = serde_json::from_slice(&bytes).with_context(|| format!("parse {}", file.display()))?;
    Ok(manifest)
}
