/// Docker-backed sandbox runtime
///
/// Every job runs in a throwaway container with no network, a hard memory
/// cap with swap disabled, a CPU share cap, a pid cap, a read-only root
/// filesystem, no capabilities and the workspace mounted read-only.
use crate::config::types::{Result, SandboxError};
use crate::exec::process::{self, ProcessOutcome};
use crate::exec::runtime::{RunOutcome, SandboxJob, SandboxRuntime};
use crate::judge::registry::SANDBOX_CODE_DIR;
use crate::observability::audit;
use std::process::Command;
use std::time::Duration;
use uuid::Uuid;

/// Exit status the Docker CLI uses for its own failures.
const DOCKER_CLI_FAILURE: i32 = 125;

/// Bound on probe commands
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on each `docker kill` / `docker rm` step after a timeout. The
/// job's caller is already past its deadline.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

const CONTROL_CAPTURE_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn container_name(job_id: Uuid) -> String {
        format!("snipbox-{}", job_id)
    }

    /// Arguments after the binary name for `docker run`.
    pub fn build_run_args(&self, job: &SandboxJob<'_>) -> Vec<String> {
        let limits = job.limits;
        let memory = format!("{}m", limits.memory_mb);

        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            Self::container_name(job.job_id),
            "--network".into(),
            "none".into(),
            "--memory".into(),
            memory.clone(),
            "--memory-swap".into(),
            memory,
            "--cpus".into(),
            limits.cpus.to_string(),
            "--pids-limit".into(),
            limits.pids_limit.to_string(),
            "--read-only".into(),
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges".into(),
            "-v".into(),
            format!("{}:{}:ro", job.workspace.display(), SANDBOX_CODE_DIR),
            job.profile.image_ref.clone(),
        ];
        args.extend(job.profile.run_command.iter().cloned());
        args
    }

    fn control(&self, args: &[&str], timeout: Duration) -> Result<ProcessOutcome> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        process::run_with_deadline(cmd, timeout, CONTROL_CAPTURE_BYTES, || {})
    }

    /// Kill the container; force-remove it only if the kill did not land.
    /// A killed `--rm` container is removed by the daemon. Best effort;
    /// problems are logged.
    pub fn terminate(&self, job_id: Uuid) {
        let name = Self::container_name(job_id);
        audit::events::forced_kill(job_id, &format!("wall time limit, container {}", name));

        let killed = self.control(&["kill", name.as_str()], TERMINATE_TIMEOUT);
        log_step("kill", &name, &killed);

        if needs_force_remove(&killed) {
            let removed = self.control(&["rm", "--force", name.as_str()], TERMINATE_TIMEOUT);
            log_step("rm", &name, &removed);
        }
    }

    /// Server version reported by the daemon.
    pub fn probe(&self) -> Result<String> {
        match self.control(&["version", "--format", "{{.Server.Version}}"], CONTROL_TIMEOUT)? {
            ProcessOutcome::Exited {
                stdout,
                exit_code: Some(0),
                ..
            } => Ok(String::from_utf8_lossy(&stdout.bytes).trim().to_string()),
            ProcessOutcome::Exited { stderr, .. } => Err(SandboxError::RuntimeUnavailable(
                String::from_utf8_lossy(&stderr.bytes).trim().to_string(),
            )),
            ProcessOutcome::TimedOut { .. } => Err(SandboxError::RuntimeUnavailable(format!(
                "{} version did not answer within {:?}",
                self.binary, CONTROL_TIMEOUT
            ))),
        }
    }

    /// Whether `image` is available locally.
    pub fn image_present(&self, image: &str) -> Result<bool> {
        match self.control(
            &["image", "inspect", "--format", "{{.Id}}", image],
            CONTROL_TIMEOUT,
        )? {
            ProcessOutcome::Exited { exit_code, .. } => Ok(exit_code == Some(0)),
            ProcessOutcome::TimedOut { .. } => Err(SandboxError::RuntimeUnavailable(format!(
                "{} image inspect did not answer within {:?}",
                self.binary, CONTROL_TIMEOUT
            ))),
        }
    }
}

fn needs_force_remove(kill: &Result<ProcessOutcome>) -> bool {
    !matches!(kill, Ok(ProcessOutcome::Exited { exit_code: Some(0), .. }))
}

fn log_step(step: &str, name: &str, outcome: &Result<ProcessOutcome>) {
    match outcome {
        Ok(ProcessOutcome::Exited { exit_code: Some(0), .. }) => {
            log::debug!("docker {} {} ok", step, name);
        }
        Ok(ProcessOutcome::Exited { stderr, .. }) => {
            // container may already be gone
            log::debug!(
                "docker {} {}: {}",
                step,
                name,
                String::from_utf8_lossy(&stderr.bytes).trim()
            );
        }
        Ok(ProcessOutcome::TimedOut { .. }) => {
            log::warn!("docker {} {} did not finish in {:?}", step, name, TERMINATE_TIMEOUT);
        }
        Err(e) => log::warn!("docker {} {} failed: {}", step, name, e),
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl SandboxRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    fn run(&self, job: &SandboxJob<'_>) -> Result<RunOutcome> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_run_args(job));

        log::debug!(
            "Launching {} for job {} ({})",
            job.profile.image_ref,
            job.job_id,
            job.profile.id
        );

        let outcome = process::run_with_deadline(
            cmd,
            job.limits.timeout(),
            job.limits.capture_limit_bytes(),
            || self.terminate(job.job_id),
        )?;

        match outcome {
            ProcessOutcome::TimedOut { wall_time } => Ok(RunOutcome::TimedOut { wall_time }),
            ProcessOutcome::Exited {
                stdout,
                stderr,
                exit_code,
                wall_time,
            } => {
                if exit_code == Some(DOCKER_CLI_FAILURE) && stdout.bytes.is_empty() {
                    return Err(SandboxError::RuntimeFailure(
                        String::from_utf8_lossy(&stderr.bytes).trim().to_string(),
                    ));
                }
                Ok(RunOutcome::Completed {
                    stdout,
                    stderr,
                    exit_code,
                    wall_time,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ResourceLimits;
    use crate::judge::registry::LanguageRegistry;
    use std::path::Path;

    #[test]
    fn test_run_args_envelope() {
        let registry = LanguageRegistry::new();
        let limits = ResourceLimits::default();
        let job_id = Uuid::nil();
        let job = SandboxJob {
            job_id,
            workspace: Path::new("/tmp/snipbox-x"),
            profile: registry.resolve("python").unwrap(),
            limits: &limits,
        };

        let args = DockerRuntime::default().build_run_args(&job);
        let joined = args.join(" ");

        assert_eq!(
            joined,
            format!(
                "run --rm --name snipbox-{} --network none --memory 128m --memory-swap 128m \
                 --cpus 0.5 --pids-limit 64 --read-only --cap-drop ALL \
                 --security-opt no-new-privileges -v /tmp/snipbox-x:/code:ro \
                 python:3.11-slim python3 /code/script.py",
                job_id
            )
        );
    }

    #[test]
    fn test_run_args_follow_limits_and_profile() {
        let registry = LanguageRegistry::new();
        let limits = ResourceLimits {
            memory_mb: 256,
            cpus: 1.0,
            pids_limit: 16,
            ..ResourceLimits::default()
        };
        let job = SandboxJob {
            job_id: Uuid::new_v4(),
            workspace: Path::new("/w"),
            profile: registry.resolve("js").unwrap(),
            limits: &limits,
        };

        let args = DockerRuntime::new("podman").build_run_args(&job);
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(args[pos("--memory") + 1], "256m");
        assert_eq!(args[pos("--memory-swap") + 1], "256m");
        assert_eq!(args[pos("--cpus") + 1], "1");
        assert_eq!(args[pos("--pids-limit") + 1], "16");
        assert_eq!(&args[args.len() - 3..], ["node:20-slim", "node", "/code/script.js"]);
    }

    fn exited(code: Option<i32>) -> Result<ProcessOutcome> {
        Ok(ProcessOutcome::Exited {
            stdout: "".into(),
            stderr: "No such container".into(),
            exit_code: code,
            wall_time: Duration::from_millis(5),
        })
    }

    #[test]
    fn test_force_remove_only_after_failed_kill() {
        assert!(!needs_force_remove(&exited(Some(0))));
        assert!(needs_force_remove(&exited(Some(1))));
        assert!(needs_force_remove(&exited(None)));
        assert!(needs_force_remove(&Ok(ProcessOutcome::TimedOut {
            wall_time: TERMINATE_TIMEOUT,
        })));
        assert!(needs_force_remove(&Err(SandboxError::RuntimeUnavailable(
            "no docker".into()
        ))));
    }

    #[test]
    fn test_terminate_steps_are_bounded_below_probe_timeout() {
        assert!(TERMINATE_TIMEOUT * 2 <= CONTROL_TIMEOUT);
    }

    #[test]
    fn test_terminate_with_missing_binary_returns() {
        let runtime = DockerRuntime::new("/nonexistent/snipbox-docker");
        let started = std::time::Instant::now();
        runtime.terminate(Uuid::new_v4());
        assert!(started.elapsed() < TERMINATE_TIMEOUT);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let runtime = DockerRuntime::new("/nonexistent/snipbox-docker");
        assert!(matches!(
            runtime.probe(),
            Err(SandboxError::RuntimeUnavailable(_))
        ));
    }
}
