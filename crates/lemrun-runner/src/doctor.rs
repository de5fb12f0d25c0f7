use std::fmt;
use std::path::Path;

use lemrun_core::ProvenancePolicy;

use crate::provenance::{resolve_revision, tracked_paths};
use crate::util::has_cmd;
use crate::JobFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Clone, Debug)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.status {
            CheckStatus::Ok => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "FAIL",
        };
        write!(f, "[{tag:>4}] {}: {}", self.name, self.detail)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    fn push(&mut self, name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) {
        self.checks.push(Check { name: name.into(), status, detail: detail.into() });
    }
}

/// Check the launch preconditions without creating a run.
pub fn doctor(file: &JobFile) -> DoctorReport {
    let job = &file.job;
    let mut report = DoctorReport::default();

    match job.validate() {
        Ok(()) => report.push("job spec", CheckStatus::Ok, format!("{} ({})", job.job_name, job.time_limit)),
        Err(e) => report.push("job spec", CheckStatus::Fail, e.to_string()),
    }

    let driver = &job.driver_script_path;
    if driver.is_file() {
        report.push("driver", CheckStatus::Ok, driver.display().to_string());
    } else {
        report.push("driver", CheckStatus::Fail, format!("{} is not a readable file", driver.display()));
    }

    if has_cmd(&job.interpreter) {
        report.push("interpreter", CheckStatus::Ok, job.interpreter.clone());
    } else {
        report.push("interpreter", CheckStatus::Fail, format!("{} not found on PATH", job.interpreter));
    }

    let (status, detail) = output_root_status(&job.output_root);
    report.push("output root", status, detail);

    // Missing provenance only fails the doctor when it would fail the run.
    let miss = match file.launcher.provenance_policy {
        ProvenancePolicy::Abort => CheckStatus::Fail,
        ProvenancePolicy::Warn => CheckStatus::Warn,
    };
    for tracked in tracked_paths(job) {
        let name = format!("provenance {}", tracked.path.display());
        match resolve_revision(&tracked) {
            Ok(p) if p.dirty => report.push(name, CheckStatus::Warn, format!("{} at {} (uncommitted changes)", p.label, p.revision)),
            Ok(p) => report.push(name, CheckStatus::Ok, format!("{} at {}", p.label, p.revision)),
            Err(e) => report.push(name, miss, e.to_string()),
        }
    }

    if has_cmd(&file.launcher.sbatch) {
        report.push("scheduler", CheckStatus::Ok, file.launcher.sbatch.clone());
    } else {
        report.push("scheduler", CheckStatus::Warn, format!("{} not found; only `launch` will work", file.launcher.sbatch));
    }

    report
}

fn output_root_status(root: &Path) -> (CheckStatus, String) {
    if root.is_dir() {
        let scratch = root.join(format!(".lemrun-write-check-{}", uuid::Uuid::new_v4().simple()));
        return match std::fs::write(&scratch, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&scratch);
                (CheckStatus::Ok, format!("{} is writable", root.display()))
            }
            Err(e) => (CheckStatus::Fail, format!("{} is not writable: {e}", root.display())),
        };
    }
    if root.exists() {
        return (CheckStatus::Fail, format!("{} exists and is not a directory", root.display()));
    }
    match root.ancestors().skip(1).find(|a| a.exists()) {
        Some(a) if a.is_dir() => (CheckStatus::Ok, format!("{} will be created under {}", root.display(), a.display())),
        Some(a) => (CheckStatus::Fail, format!("{} cannot be created: {} is not a directory", root.display(), a.display())),
        None => (CheckStatus::Fail, format!("{} has no existing ancestor", root.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn find<'a>(r: &'a DoctorReport, name: &str) -> &'a Check {
        r.checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn missing_driver_fails() {
        let dir = tempdir().unwrap();
        let mut file = JobFile::default_for("t");
        file.job.driver_script_path = dir.path().join("nope.py");
        file.job.output_root = dir.path().join("runs");

        let report = doctor(&file);
        assert!(!report.is_ok());
        assert_eq!(find(&report, "driver").status, CheckStatus::Fail);
        assert_eq!(find(&report, "output root").status, CheckStatus::Ok);
    }

    #[test]
    fn output_root_under_a_file_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let (status, _) = output_root_status(&blocker.join("runs"));
        assert_eq!(status, CheckStatus::Fail);
    }
}
