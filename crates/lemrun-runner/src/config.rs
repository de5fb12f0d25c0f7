use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lemrun_core::{JobSpec, NotifyEvent, ProvenancePolicy, TimeLimit};

pub const DEFAULT_JOB_FILE: &str = "lemrun.toml";

fn default_job_id_env() -> String {
    "SLURM_JOB_ID".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sbatch() -> String {
    "sbatch".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LauncherConfig {
    #[serde(default)]
    pub provenance_policy: ProvenancePolicy,
    /// Environment variable carrying the scheduler-assigned job id.
    #[serde(default = "default_job_id_env")]
    pub job_id_env: String,
    #[serde(default = "default_true")]
    pub write_run_record: bool,
    #[serde(default = "default_sbatch")]
    pub sbatch: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            provenance_policy: ProvenancePolicy::default(),
            job_id_env: default_job_id_env(),
            write_run_record: true,
            sbatch: default_sbatch(),
        }
    }
}

impl LauncherConfig {
    pub fn scheduler_job_id(&self) -> Option<String> {
        std::env::var(&self.job_id_env).ok()
    }
}

/// On-disk job description: `[job]` plus optional `[launcher]` settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobFile {
    pub job: JobSpec,
    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl JobFile {
    pub fn default_for(job_name: &str) -> Self {
        Self {
            job: JobSpec {
                job_name: job_name.to_string(),
                time_limit: TimeLimit::from_secs(24 * 3600),
                partition: "shared".to_string(),
                node_count: 1,
                tasks_per_node: 1,
                notify_emails: Default::default(),
                notify_events: [NotifyEvent::End, NotifyEvent::Fail].into_iter().collect(),
                driver_script_path: PathBuf::from("driver.py"),
                output_root: PathBuf::from("~/runs"),
                extra_repo_paths: vec![],
                interpreter: "python".to_string(),
                driver_args: vec![],
                prelude: vec![],
            },
            launcher: LauncherConfig::default(),
        }
    }

    /// Load TOML, or YAML for `.yaml`/`.yml`. Paths are `~`-expanded and
    /// relative ones resolved against the job file's directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let mut file: JobFile = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&s).with_context(|| format!("parse {}", path.display()))?
            }
            _ => toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?,
        };

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        file.job.driver_script_path = resolve_path(&base, &file.job.driver_script_path);
        file.job.output_root = resolve_path(&base, &file.job.output_root);
        for p in file.job.extra_repo_paths.iter_mut() {
            *p = resolve_path(&base, p);
        }
        Ok(file)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

fn resolve_path(base: &Path, p: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_reports_uncreatable_parent() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("sub").join(DEFAULT_JOB_FILE);

        let err = JobFile::default_for("Test").save_to(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(&format!("create {}", blocker.join("sub").display())), "{msg}");
        assert!(!path.exists());
    }

    #[test]
    fn default_file_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_JOB_FILE);
        JobFile::default_for("Test").save_to(&path).unwrap();

        let loaded = JobFile::load_from(&path).unwrap();
        assert_eq!(loaded.job.job_name, "Test");
        assert_eq!(loaded.job.time_limit.to_string(), "24:00:00");
        assert_eq!(loaded.job.driver_script_path, dir.path().join("driver.py"));
        assert_eq!(loaded.launcher, LauncherConfig::default());
    }

    #[test]
    fn loads_yaml_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        std::fs::write(
            &path,
            r#"
job:
  job_name: SteadyShear
  time_limit: "1-12:00:00"
  partition: parallel
  node_count: 2
  notify_events: [begin, fail]
  notify_emails: [a@example.com]
  driver_script_path: /abs/sim.py
  output_root: out
  extra_repo_paths: [../landlab]
launcher:
  provenance_policy: abort
"#,
        )
        .unwrap();

        let f = JobFile::load_from(&path).unwrap();
        assert_eq!(f.job.node_count, 2);
        assert_eq!(f.job.tasks_per_node, 1);
        assert_eq!(f.job.interpreter, "python");
        assert_eq!(f.job.time_limit.as_duration().as_secs(), 36 * 3600);
        assert_eq!(f.job.driver_script_path, PathBuf::from("/abs/sim.py"));
        assert_eq!(f.job.output_root, dir.path().join("out"));
        assert_eq!(f.job.extra_repo_paths, vec![dir.path().join("../landlab")]);
        assert_eq!(f.launcher.provenance_policy, ProvenancePolicy::Abort);
        assert_eq!(f.launcher.job_id_env, "SLURM_JOB_ID");
    }

    #[test]
    fn rejects_bad_time_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            r#"
[job]
job_name = "x"
time_limit = "forever"
partition = "p"
driver_script_path = "a.py"
output_root = "out"
"#,
        )
        .unwrap();
        let err = JobFile::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("time limit"));
    }
}
