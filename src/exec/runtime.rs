//! Sandbox runtime seam.
//!
//! The engine only knows this trait. `DockerRuntime` is the production
//! implementation; tests substitute scripted fakes.

use crate::config::types::{ResourceLimits, Result};
use crate::judge::registry::LanguageProfile;
use crate::utils::output::CapturedStream;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// One prepared job, ready to launch
#[derive(Debug, Clone, Copy)]
pub struct SandboxJob<'a> {
    pub job_id: Uuid,
    /// Host directory holding the wrapped script
    pub workspace: &'a Path,
    pub profile: &'a LanguageProfile,
    pub limits: &'a ResourceLimits,
}

/// What the runtime observed
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed {
        stdout: CapturedStream,
        stderr: CapturedStream,
        exit_code: Option<i32>,
        wall_time: Duration,
    },
    TimedOut {
        wall_time: Duration,
    },
}

/// Runs a job under the fixed resource envelope.
///
/// Implementations return `Err` only for infrastructure problems; snippet
/// faults come back as `Completed` with whatever the snippet printed.
pub trait SandboxRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, job: &SandboxJob<'_>) -> Result<RunOutcome>;
}
