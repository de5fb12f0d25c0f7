use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lemrun_core::RunId;
use lemrun_runner::{
    batch_script_path, doctor, load_manifest, render_batch_script, submit, write_batch_script, JobFile, RunLauncher,
    DEFAULT_JOB_FILE,
};

#[derive(Parser)]
#[command(name = "lemrun", version, about = "Provision, record and launch reproducible simulation runs")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter job file
    Init {
        #[arg(long, default_value = DEFAULT_JOB_FILE)]
        path: PathBuf,
        /// Job name; defaults to the current directory name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        force: bool,
    },

    /// Check launch preconditions for a job file
    Doctor {
        #[arg(long, default_value = DEFAULT_JOB_FILE)]
        job: PathBuf,
    },

    /// Print (or write) the scheduler batch script for a job file
    Render {
        #[arg(long, default_value = DEFAULT_JOB_FILE)]
        job: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render the batch script and hand it to sbatch
    Submit {
        #[arg(long, default_value = DEFAULT_JOB_FILE)]
        job: PathBuf,
    },

    /// Provision a run directory, record provenance, stage the driver and run it
    Launch {
        #[arg(long, default_value = DEFAULT_JOB_FILE)]
        job: PathBuf,
        /// Overrides the scheduler job id from the environment
        #[arg(long)]
        run_id: Option<String>,
        /// Return as soon as the simulation has started
        #[arg(long)]
        detach: bool,
    },

    /// Print the run record of a run directory
    Show {
        #[arg(long)]
        run_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Init { path, name, force } => {
            if path.exists() && !force {
                return Err(anyhow!("{} already exists (use --force to overwrite)", path.display()));
            }
            let name = match name {
                Some(n) => n,
                None => std::env::current_dir()?
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("run")
                    .to_string(),
            };
            JobFile::default_for(&name).save_to(&path)?;
            println!("Wrote {}", path.display());
        }
        Command::Doctor { job } => {
            let file = JobFile::load_from(&job)?;
            let report = doctor(&file);
            for check in &report.checks {
                println!("{check}");
            }
            if !report.is_ok() {
                return Err(anyhow!("doctor found problems"));
            }
            println!("OK");
        }
        Command::Render { job, out } => {
            let file = JobFile::load_from(&job)?;
            file.job.validate()?;
            let script = render_batch_script(&file.job, &launch_argv(&job)?);
            match out {
                Some(path) => {
                    write_batch_script(&path, &script)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{script}"),
            }
        }
        Command::Submit { job } => {
            let file = JobFile::load_from(&job)?;
            file.job.validate()?;
            let script = render_batch_script(&file.job, &launch_argv(&job)?);
            let path = batch_script_path(&file.job);
            write_batch_script(&path, &script)?;
            let job_id = submit(&file.launcher.sbatch, &path)?;
            println!("Submitted batch job {job_id} ({})", path.display());
        }
        Command::Launch { job, run_id, detach } => {
            let file = JobFile::load_from(&job)?;
            let run_id = RunId::resolve(run_id, file.launcher.scheduler_job_id())?;
            let launcher = RunLauncher::new(file.launcher.clone());

            let mut run = launcher.run(&file.job, run_id).map_err(|e| {
                error!(step = e.step(), "launch aborted: {e}");
                e
            })?;
            println!("Run {} in {} (pid {})", run.record.run_id, run.record.run_dir.display(), run.handle.pid());

            if detach {
                return Ok(());
            }
            // A batch job ends when its script exits, so stay with the simulation.
            let status = run.handle.wait().context("wait for simulation")?;
            info!(run_id = %run.record.run_id, %status, "simulation finished");
            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }
        Command::Show { run_dir } => {
            let manifest = load_manifest(&run_dir)?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
    }

    Ok(())
}

/// Command line the batch script uses to re-enter this binary on the compute node.
fn launch_argv(job: &Path) -> anyhow::Result<Vec<String>> {
    let exe = std::env::current_exe().context("locate lemrun executable")?;
    let job = std::fs::canonicalize(job).with_context(|| format!("resolve {}", job.display()))?;
    Ok(vec![
        exe.to_string_lossy().to_string(),
        "launch".to_string(),
        "--job".to_string(),
        job.to_string_lossy().to_string(),
    ])
}
