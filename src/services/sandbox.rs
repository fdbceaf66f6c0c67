use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

use crate::core::config::SandboxSettings;
use crate::harness::languages::Language;
use crate::services::fixtures::Workspace;

/// Terminal result of one container invocation. There is no retry variant
/// on purpose: one submission, one launch, one verdict.
#[derive(Debug)]
pub(crate) enum SandboxRun {
    Completed { stdout: String, stderr: String, exit_ok: bool, duration: Duration },
    TimedOut { duration: Duration },
}

#[derive(Debug, Error)]
pub(crate) enum SandboxError {
    #[error("failed to resolve workspace {path}: {source}")]
    Resolve { path: PathBuf, source: std::io::Error },
    #[error("failed to launch sandbox: {0}")]
    Launch(std::io::Error),
    #[error("failed waiting for sandbox: {0}")]
    Wait(std::io::Error),
}

/// Launches the per-language runner image against a staged workspace. The
/// two read-only bind mounts are the only thing that crosses the container
/// boundary; results come back on stdout.
pub(crate) async fn run(
    settings: &SandboxSettings,
    workspace: &Workspace,
    language: Language,
) -> Result<SandboxRun, SandboxError> {
    // Bind mounts need absolute paths even when the workspace root is
    // configured relative.
    let root = tokio::fs::canonicalize(workspace.root())
        .await
        .map_err(|source| SandboxError::Resolve { path: workspace.root().to_path_buf(), source })?;

    let container_name = format!("gradecell-{}", workspace.id());
    let image = settings.image_for(language.name());

    let mut command = Command::new(&settings.docker_bin);
    command
        .arg("run")
        .arg("--rm")
        .arg("--name")
        .arg(&container_name)
        .arg("--network")
        .arg("none")
        .arg(format!("--memory={}m", settings.memory_limit_mb))
        .arg(format!("--cpus={}", settings.cpu_limit))
        .arg(format!("--pids-limit={}", settings.pids_limit))
        .arg("-v")
        .arg(format!("{}:/app/student:ro", root.join("student").display()))
        .arg("-v")
        .arg(format!("{}:/app/tests:ro", root.join("tests").display()))
        .arg(&image)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(container = %container_name, image = %image, "launching sandbox");
    let started = Instant::now();
    let child = command.spawn().map_err(SandboxError::Launch)?;

    match tokio::time::timeout(settings.wall_timeout(), child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(SandboxRun::Completed {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_ok: output.status.success(),
            duration: started.elapsed(),
        }),
        Ok(Err(err)) => Err(SandboxError::Wait(err)),
        Err(_) => {
            // The timed-out future already killed the CLI client on drop;
            // the container and its whole process tree go down by name.
            kill_container(&settings.docker_bin, &container_name).await;
            Ok(SandboxRun::TimedOut { duration: started.elapsed() })
        }
    }
}

async fn kill_container(docker_bin: &str, name: &str) {
    let result = Command::new(docker_bin)
        .arg("kill")
        .arg(name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => {
            tracing::info!(container = %name, "sandbox killed after wall timeout");
        }
        Ok(status) => {
            tracing::warn!(container = %name, %status, "sandbox kill returned nonzero");
        }
        Err(err) => {
            tracing::warn!(container = %name, error = %err, "failed to run sandbox kill");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    fn settings_with(docker_bin: &str, wall_timeout_secs: u64) -> SandboxSettings {
        SandboxSettings {
            docker_bin: docker_bin.to_string(),
            image_prefix: "code-runner-".to_string(),
            workspace_root: "submissions".to_string(),
            wall_timeout_secs,
            memory_limit_mb: 256,
            cpu_limit: 0.5,
            pids_limit: 64,
            max_concurrent: 4,
        }
    }

    #[cfg(unix)]
    fn write_stub(dir: &std::path::Path, name: &str, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, script).expect("stub script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_limits_mounts_and_image_to_the_container_cli() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = write_stub(dir.path(), "docker-stub", "#!/bin/sh\necho \"$@\"\n");
        let workspace =
            fixtures::stage(dir.path(), Language::Python, "print()", &[]).await.expect("stage");

        let run = run(&settings_with(&stub, 5), &workspace, Language::Python)
            .await
            .expect("sandbox run");

        let SandboxRun::Completed { stdout, exit_ok, .. } = run else {
            panic!("expected completion");
        };
        assert!(exit_ok);
        assert!(stdout.contains("--network none"));
        assert!(stdout.contains("--memory=256m"));
        assert!(stdout.contains("--cpus=0.5"));
        assert!(stdout.contains("--pids-limit=64"));
        assert!(stdout.contains("/student:/app/student:ro"));
        assert!(stdout.contains("/tests:/app/tests:ro"));
        assert!(stdout.trim_end().ends_with("code-runner-python"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wall_clock_timeout_reports_timed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = write_stub(
            dir.path(),
            "docker-stub",
            "#!/bin/sh\nif [ \"$1\" = kill ]; then exit 0; fi\nsleep 30\n",
        );
        let workspace =
            fixtures::stage(dir.path(), Language::Python, "print()", &[]).await.expect("stage");

        let run = run(&settings_with(&stub, 1), &workspace, Language::Python)
            .await
            .expect("sandbox run");

        assert!(matches!(run, SandboxRun::TimedOut { .. }));
    }

    #[tokio::test]
    async fn missing_container_binary_is_a_launch_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let workspace =
            fixtures::stage(dir.path(), Language::Python, "print()", &[]).await.expect("stage");

        let settings = settings_with("/nonexistent/docker-bin", 5);
        let err = run(&settings, &workspace, Language::Python).await.unwrap_err();

        assert!(matches!(err, SandboxError::Launch(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_container_exit_is_reported_not_hidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stub = write_stub(
            dir.path(),
            "docker-stub",
            "#!/bin/sh\necho 'image not found' >&2\nexit 125\n",
        );
        let workspace =
            fixtures::stage(dir.path(), Language::Python, "print()", &[]).await.expect("stage");

        let run = run(&settings_with(&stub, 5), &workspace, Language::Python)
            .await
            .expect("sandbox run");

        let SandboxRun::Completed { exit_ok, stderr, .. } = run else {
            panic!("expected completion");
        };
        assert!(!exit_ok);
        assert!(stderr.contains("image not found"));
    }
}
