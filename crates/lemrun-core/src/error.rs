use std::path::PathBuf;

use thiserror::Error;

/// Failures of the provision -> provenance -> stage -> launch pipeline.
///
/// Each variant names the step and the path involved.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid job spec: {0}")]
    InvalidJobSpec(String),

    #[error("invalid run id {0:?}: must be a single non-empty path component")]
    InvalidRunId(String),

    #[error("could not create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provenance unavailable for {}: {reason}", path.display())]
    ProvenanceUnavailable { path: PathBuf, reason: String },

    #[error("could not copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write run record {}: {reason}", path.display())]
    RunRecord { path: PathBuf, reason: String },
}

impl LaunchError {
    /// Pipeline step the error belongs to, for log fields.
    pub fn step(&self) -> &'static str {
        match self {
            LaunchError::InvalidJobSpec(_) | LaunchError::InvalidRunId(_) => "validate",
            LaunchError::DirectoryCreation { .. } => "provision",
            LaunchError::ProvenanceUnavailable { .. } => "snapshot_provenance",
            LaunchError::Copy { .. } => "stage_driver",
            LaunchError::Launch { .. } => "launch",
            LaunchError::RunRecord { .. } => "run_record",
        }
    }
}
