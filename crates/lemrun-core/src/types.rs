use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{error::LaunchError, ids::RunId, model::NotifyEvent, time::TimeLimit};

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_count() -> u32 {
    1
}

/// Everything a single submission needs. Built once by the caller and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    pub job_name: String,
    pub time_limit: TimeLimit,
    pub partition: String,
    #[serde(default = "default_count")]
    pub node_count: u32,
    #[serde(default = "default_count")]
    pub tasks_per_node: u32,
    #[serde(default)]
    pub notify_emails: BTreeSet<String>,
    #[serde(default)]
    pub notify_events: BTreeSet<NotifyEvent>,
    pub driver_script_path: PathBuf,
    pub output_root: PathBuf,
    #[serde(default)]
    pub extra_repo_paths: Vec<PathBuf>,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default)]
    pub driver_args: Vec<String>,
    /// Raw shell lines for the batch script (module loads, env activation). Never interpreted.
    #[serde(default)]
    pub prelude: Vec<String>,
}

impl JobSpec {
    pub fn validate(&self) -> Result<(), LaunchError> {
        let invalid = |msg: String| Err(LaunchError::InvalidJobSpec(msg));

        if self.job_name.trim().is_empty() {
            return invalid("job_name is empty".into());
        }
        if self.job_name.chars().any(|c| c.is_control()) {
            return invalid(format!("job_name {:?} contains control characters", self.job_name));
        }
        if self.partition.trim().is_empty() {
            return invalid("partition is empty".into());
        }
        if self.node_count == 0 {
            return invalid("node_count must be at least 1".into());
        }
        if self.tasks_per_node == 0 {
            return invalid("tasks_per_node must be at least 1".into());
        }
        if self.time_limit.is_zero() {
            return invalid("time_limit must be non-zero".into());
        }
        if self.interpreter.trim().is_empty() {
            return invalid("interpreter is empty".into());
        }
        if self.driver_file_name().is_none() {
            return invalid(format!(
                "driver_script_path {} has no file name",
                self.driver_script_path.display()
            ));
        }

        let mut seen = BTreeSet::new();
        for p in &self.extra_repo_paths {
            let label = repo_label(p).ok_or_else(|| {
                LaunchError::InvalidJobSpec(format!("repository path {} has no usable name", p.display()))
            })?;
            if !seen.insert(label.clone()) {
                return invalid(format!("two repository paths share the label {label:?}"));
            }
        }
        Ok(())
    }

    pub fn driver_file_name(&self) -> Option<&std::ffi::OsStr> {
        self.driver_script_path.file_name()
    }
}

/// Label used for `<label>_id.txt`: the last component of the repository path.
pub fn repo_label(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Provisioned run. `revision_ids` is only filled by the provenance step,
/// which always happens before launch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub revision_ids: BTreeMap<String, String>,
}

impl RunRecord {
    pub fn new(run_id: RunId, output_root: &Path) -> Self {
        let run_dir = output_root.join(run_id.as_str());
        let data_dir = run_dir.join("data");
        Self { run_id, run_dir, data_dir, revision_ids: BTreeMap::new() }
    }

    pub fn revision_file(&self, label: &str) -> PathBuf {
        self.run_dir.join(format!("{label}_id.txt"))
    }
}
