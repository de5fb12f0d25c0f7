use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use lemrun_core::{now_unix, JobSpec, LaunchError, ProvenancePolicy, RunId, RunRecord};
use tracing::{info, warn};

use crate::manifest::{write_manifest, RunManifest};
use crate::provenance::{resolve_revision, tracked_paths, ProvenanceReport};
use crate::util::sha256_file;
use crate::LauncherConfig;

pub const ENV_RUN_ID: &str = "LEMRUN_RUN_ID";
pub const ENV_RUN_DIR: &str = "LEMRUN_RUN_DIR";
pub const ENV_DATA_DIR: &str = "LEMRUN_DATA_DIR";

/// A started simulation process. The launcher does not supervise it.
#[derive(Debug)]
pub struct ProcessHandle {
    pub run_id: RunId,
    pub program: String,
    child: Child,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Result of the full pipeline.
#[derive(Debug)]
pub struct LaunchedRun {
    pub record: RunRecord,
    pub staged_driver: PathBuf,
    pub provenance: ProvenanceReport,
    pub manifest_path: Option<PathBuf>,
    pub handle: ProcessHandle,
}

/// Provisions a run directory, records provenance, stages the driver and starts it.
///
/// The steps are strictly ordered; any error aborts the rest and leaves what was
/// already created on disk for inspection.
#[derive(Clone, Debug, Default)]
pub struct RunLauncher {
    pub cfg: LauncherConfig,
}

impl RunLauncher {
    pub fn new(cfg: LauncherConfig) -> Self {
        Self { cfg }
    }

    pub fn provision(&self, job: &JobSpec, run_id: RunId) -> Result<RunRecord, LaunchError> {
        job.validate()?;
        run_id.validate()?;

        // The output root is shared between runs; only run_dir must be new.
        std::fs::create_dir_all(&job.output_root).map_err(|source| LaunchError::DirectoryCreation {
            path: job.output_root.clone(),
            source,
        })?;

        let record = RunRecord::new(run_id, &job.output_root);
        for dir in [&record.run_dir, &record.data_dir] {
            std::fs::create_dir(dir).map_err(|source| LaunchError::DirectoryCreation {
                path: dir.clone(),
                source,
            })?;
        }

        info!(run_id = %record.run_id, run_dir = %record.run_dir.display(), "provisioned run directory");
        Ok(record)
    }

    /// Write `<label>_id.txt` for the driver's repository and every extra repository.
    pub fn snapshot_provenance(
        &self,
        job: &JobSpec,
        record: &mut RunRecord,
    ) -> Result<ProvenanceReport, LaunchError> {
        let mut report = ProvenanceReport::default();
        let mut roots: BTreeMap<String, PathBuf> = BTreeMap::new();

        for tracked in tracked_paths(job) {
            let prov = match resolve_revision(&tracked) {
                Ok(p) => p,
                Err(e) => match self.cfg.provenance_policy {
                    ProvenancePolicy::Abort => return Err(e),
                    ProvenancePolicy::Warn => {
                        warn!(run_id = %record.run_id, "continuing without revision: {e}");
                        report.warnings.push(e.to_string());
                        continue;
                    }
                },
            };

            if let Some(seen_root) = roots.get(&prov.label) {
                if *seen_root == prov.repo_root {
                    continue;
                }
                return Err(LaunchError::InvalidJobSpec(format!(
                    "repositories {} and {} share the label {:?}",
                    seen_root.display(),
                    prov.repo_root.display(),
                    prov.label
                )));
            }
            roots.insert(prov.label.clone(), prov.repo_root.clone());

            let file = record.revision_file(&prov.label);
            std::fs::write(&file, format!("{}\n", prov.revision)).map_err(|e| {
                LaunchError::ProvenanceUnavailable {
                    path: file.clone(),
                    reason: format!("could not write revision file: {e}"),
                }
            })?;
            if prov.dirty {
                warn!(repo = %prov.repo_root.display(), revision = %prov.revision, "repository has uncommitted changes");
            }
            info!(label = %prov.label, revision = %prov.revision, vcs = ?prov.vcs, "recorded revision");

            record.revision_ids.insert(prov.label.clone(), prov.revision.clone());
            report.repositories.push(prov);
        }
        Ok(report)
    }

    /// Copy the driver into the run directory, keeping its permission bits.
    ///
    /// The destination is opened with `create_new`, so an existing file is never
    /// overwritten, even by a concurrent stage into the same directory.
    pub fn stage_driver(&self, job: &JobSpec, record: &RunRecord) -> Result<PathBuf, LaunchError> {
        let from = job.driver_script_path.clone();
        let name = job.driver_file_name().ok_or_else(|| {
            LaunchError::InvalidJobSpec(format!("driver_script_path {} has no file name", from.display()))
        })?;
        let to = record.run_dir.join(name);
        let copy_err = |source: io::Error| LaunchError::Copy { from: from.clone(), to: to.clone(), source };

        let meta = std::fs::metadata(&from).map_err(copy_err)?;
        if !meta.is_file() {
            return Err(copy_err(io::Error::new(io::ErrorKind::InvalidInput, "driver is not a regular file")));
        }
        let mut src = File::open(&from).map_err(copy_err)?;
        let mut dst = OpenOptions::new().write(true).create_new(true).open(&to).map_err(copy_err)?;

        // Past this point `to` is ours; remove it on any failure.
        let copied = io::copy(&mut src, &mut dst)
            .and_then(|_| dst.sync_all())
            .and_then(|_| std::fs::set_permissions(&to, meta.permissions()));
        if let Err(e) = copied {
            drop(dst);
            let _ = std::fs::remove_file(&to);
            return Err(copy_err(e));
        }
        info!(driver = %to.display(), "staged driver");
        Ok(to)
    }

    /// Start `<interpreter> <staged_driver> <driver_args..>` inside the run directory.
    pub fn launch(
        &self,
        job: &JobSpec,
        record: &RunRecord,
        staged_driver: &Path,
    ) -> Result<ProcessHandle, LaunchError> {
        let program = job.interpreter.clone();
        if !staged_driver.is_file() {
            return Err(LaunchError::Launch {
                program,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("staged driver {} not found", staged_driver.display()),
                ),
            });
        }

        let child = Command::new(&program)
            .arg(staged_driver)
            .args(&job.driver_args)
            .current_dir(&record.run_dir)
            .stdin(Stdio::null())
            .env(ENV_RUN_ID, record.run_id.as_str())
            .env(ENV_RUN_DIR, &record.run_dir)
            .env(ENV_DATA_DIR, &record.data_dir)
            .spawn()
            .map_err(|source| LaunchError::Launch { program: program.clone(), source })?;

        info!(run_id = %record.run_id, pid = child.id(), program = %program, "launched simulation");
        Ok(ProcessHandle { run_id: record.run_id.clone(), program, child })
    }

    /// provision -> snapshot_provenance -> stage_driver -> (run record) -> launch.
    pub fn run(&self, job: &JobSpec, run_id: RunId) -> Result<LaunchedRun, LaunchError> {
        let mut record = self.provision(job, run_id)?;
        let provenance = self.snapshot_provenance(job, &mut record)?;
        let staged_driver = self.stage_driver(job, &record)?;

        let manifest_path = if self.cfg.write_run_record {
            Some(self.write_run_record(job, &record, &staged_driver, &provenance)?)
        } else {
            None
        };

        let handle = self.launch(job, &record, &staged_driver)?;
        Ok(LaunchedRun { record, staged_driver, provenance, manifest_path, handle })
    }

    fn write_run_record(
        &self,
        job: &JobSpec,
        record: &RunRecord,
        staged_driver: &Path,
        provenance: &ProvenanceReport,
    ) -> Result<PathBuf, LaunchError> {
        let path = record.run_dir.join(crate::manifest::RUN_RECORD_FILE);
        let record_err = |e: anyhow::Error| LaunchError::RunRecord { path: path.clone(), reason: format!("{e:#}") };

        let manifest = RunManifest {
            record: record.clone(),
            job: job.clone(),
            staged_driver: staged_driver.to_path_buf(),
            driver_sha256: sha256_file(staged_driver).map_err(record_err)?,
            provenance: provenance.clone(),
            created_at_unix: now_unix(),
            launcher_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        write_manifest(&record.run_dir, &manifest).map_err(record_err)
    }
}
