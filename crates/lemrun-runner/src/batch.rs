use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use lemrun_core::JobSpec;
use tracing::info;

use crate::util::{has_cmd, shell_escape};

/// Render the scheduler batch script that re-enters `lemrun launch` on the compute node.
///
/// `launch_argv` is the full launcher command line, program first.
pub fn render_batch_script(job: &JobSpec, launch_argv: &[String]) -> String {
    let mut lines = Vec::new();
    lines.push("#!/bin/bash".to_string());
    lines.push(format!("#SBATCH --job-name={}", shell_escape(&job.job_name)));
    lines.push(format!("#SBATCH --time={}", job.time_limit));
    lines.push(format!("#SBATCH --partition={}", shell_escape(&job.partition)));
    lines.push(format!("#SBATCH --nodes={}", job.node_count));
    lines.push(format!("#SBATCH --ntasks-per-node={}", job.tasks_per_node));
    if !job.notify_events.is_empty() {
        let events: Vec<&str> = job.notify_events.iter().map(|e| e.as_directive()).collect();
        lines.push(format!("#SBATCH --mail-type={}", events.join(",")));
    }
    if !job.notify_emails.is_empty() {
        let emails: Vec<&str> = job.notify_emails.iter().map(String::as_str).collect();
        lines.push(format!("#SBATCH --mail-user={}", shell_escape(&emails.join(","))));
    }
    lines.push(String::new());
    lines.push("set -euo pipefail".to_string());

    for line in &job.prelude {
        lines.push(line.clone());
    }

    let cmd = launch_argv.iter().map(|a| shell_escape(a)).collect::<Vec<_>>().join(" ");
    lines.push(format!("exec {cmd}"));

    lines.join("\n") + "\n"
}

pub fn write_batch_script(path: &Path, script: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, script).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// Where `submit` keeps generated scripts: `<output_root>/.lemrun/batch/<job>-<uuid>.sh`.
pub fn batch_script_path(job: &JobSpec) -> PathBuf {
    let safe_name: String = job
        .job_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    job.output_root
        .join(".lemrun")
        .join("batch")
        .join(format!("{}-{}.sh", safe_name, uuid::Uuid::new_v4().simple()))
}

/// Submit with `sbatch --parsable` and return the scheduler job id.
pub fn submit(sbatch: &str, script_path: &Path) -> Result<String> {
    if !has_cmd(sbatch) {
        return Err(anyhow!("{sbatch} not found on PATH"));
    }

    let out = Command::new(sbatch)
        .arg("--parsable")
        .arg(script_path)
        .output()
        .with_context(|| format!("running {sbatch}"))?;
    if !out.status.success() {
        return Err(anyhow!("{sbatch} failed: {}", String::from_utf8_lossy(&out.stderr)));
    }

    // --parsable prints "jobid" or "jobid;cluster".
    let job_id = parse_job_id(&String::from_utf8_lossy(&out.stdout))
        .ok_or_else(|| anyhow!("{sbatch} printed no job id"))?;
    info!(job_id = %job_id, script = %script_path.display(), "submitted batch job");
    Ok(job_id)
}

fn parse_job_id(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let id = line.split(';').next().unwrap_or(line).trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemrun_core::NotifyEvent;
    use std::path::PathBuf;

    fn job() -> JobSpec {
        JobSpec {
            job_name: "Test".into(),
            time_limit: "2-00:00:00".parse().unwrap(),
            partition: "shared".into(),
            node_count: 1,
            tasks_per_node: 24,
            notify_emails: ["b@example.com".to_string(), "a@example.com".to_string()].into_iter().collect(),
            notify_events: [NotifyEvent::Fail, NotifyEvent::Begin, NotifyEvent::End].into_iter().collect(),
            driver_script_path: PathBuf::from("/home/u/sim.py"),
            output_root: PathBuf::from("/tmp/runs"),
            extra_repo_paths: vec![],
            interpreter: "python".into(),
            driver_args: vec![],
            prelude: vec!["module load python/3.8".into(), "conda activate lem".into()],
        }
    }

    #[test]
    fn renders_directives_in_order() {
        let argv = vec!["/opt/bin/lemrun".to_string(), "launch".into(), "--job".into(), "/home/u/job file.toml".into()];
        let script = render_batch_script(&job(), &argv);
        let lines: Vec<&str> = script.lines().collect();

        assert_eq!(lines[0], "#!/bin/bash");
        assert_eq!(lines[1], "#SBATCH --job-name=Test");
        assert_eq!(lines[2], "#SBATCH --time=48:00:00");
        assert_eq!(lines[3], "#SBATCH --partition=shared");
        assert_eq!(lines[4], "#SBATCH --nodes=1");
        assert_eq!(lines[5], "#SBATCH --ntasks-per-node=24");
        assert_eq!(lines[6], "#SBATCH --mail-type=BEGIN,END,FAIL");
        assert_eq!(lines[7], "#SBATCH --mail-user=a@example.com,b@example.com");
        assert!(script.contains("module load python/3.8\nconda activate lem\n"));
        assert!(script.ends_with("exec /opt/bin/lemrun launch --job '/home/u/job file.toml'\n"));
    }

    #[test]
    fn omits_mail_directives_when_unset() {
        let mut j = job();
        j.notify_events.clear();
        j.notify_emails.clear();
        let script = render_batch_script(&j, &["lemrun".to_string()]);
        assert!(!script.contains("--mail-type"));
        assert!(!script.contains("--mail-user"));
    }

    #[test]
    fn script_path_is_unique_and_sanitized() {
        let mut j = job();
        j.job_name = "steady shear/1".into();
        let a = batch_script_path(&j);
        let b = batch_script_path(&j);
        assert_ne!(a, b);
        assert!(a.starts_with("/tmp/runs/.lemrun/batch"));
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("steady_shear_1-"));
    }

    #[test]
    fn parses_parsable_output() {
        assert_eq!(parse_job_id("12345\n").as_deref(), Some("12345"));
        assert_eq!(parse_job_id("12345;cluster\n").as_deref(), Some("12345"));
        assert_eq!(parse_job_id("\n"), None);
    }
}
