/// Core types shared by the execution engine, the HTTP layer and the CLI
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Output reported when the wall-clock limit fires.
pub const TIMEOUT_SENTINEL: &str = "Execution timed out";

/// Language used when a caller omits one.
pub const DEFAULT_LANGUAGE: &str = "python";

/// Fixed resource envelope applied to every job.
///
/// Every field has a default so partial config files deserialize.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum snippet length in characters
    pub max_code_chars: usize,
    /// Wall-clock limit in seconds
    pub timeout_secs: u64,
    /// Maximum characters of output returned to the caller
    pub output_limit_chars: usize,
    /// Memory ceiling for the container and the in-process rlimit (MiB)
    pub memory_mb: u64,
    /// CPU share ceiling, in cores
    pub cpus: f64,
    /// Process/thread ceiling inside the container
    pub pids_limit: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_code_chars: 5000,
            timeout_secs: 10,
            output_limit_chars: 20_000,
            memory_mb: 128,
            cpus: 0.5,
            pids_limit: 64,
        }
    }
}

impl ResourceLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Saturates rather than wrapping; the validator rejects such values.
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(1024 * 1024)
    }

    /// Per-stream capture cap in bytes.
    ///
    /// A UTF-8 character is at most four bytes, so this always holds at least
    /// `output_limit_chars` characters and truncation stays exact.
    pub fn capture_limit_bytes(&self) -> usize {
        self.output_limit_chars.saturating_mul(4)
    }
}

/// A validated-at-the-edge request to run one snippet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language: String,
    pub source_code: String,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
        }
    }

    /// Snippet length as the caller sees it (Unicode scalar values, not bytes).
    pub fn code_chars(&self) -> usize {
        self.source_code.chars().count()
    }
}

/// Result of one job
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// Names the workspace and container the job used
    pub job_id: Uuid,
    /// Sanitized combined stdout+stderr; never empty
    pub output: String,
    /// Whether the wall-clock limit fired
    pub timed_out: bool,
    /// Exit code of the sandboxed run, if it exited normally
    pub exit_code: Option<i32>,
    /// Wall-clock time spent in the sandbox runtime
    pub wall_time_ms: u64,
}

impl ExecutionResult {
    /// Partial output captured before the kill is discarded.
    pub fn timed_out(job_id: Uuid, wall_time_ms: u64) -> Self {
        Self {
            job_id,
            output: TIMEOUT_SENTINEL.to_string(),
            timed_out: true,
            exit_code: None,
            wall_time_ms,
        }
    }
}

/// Errors surfaced by the engine.
///
/// Snippet faults and timeouts are not errors; they come back as output.
/// Validation variants render as the exact message returned to HTTP clients.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Invalid language")]
    InvalidLanguage { language: String },

    #[error("Code must be a string")]
    CodeNotText,

    #[error("Code too long")]
    CodeTooLong { length: usize, max: usize },

    #[error("Invalid JSON")]
    InvalidRequest(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Sandbox runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Sandbox runtime failed: {0}")]
    RuntimeFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// True for errors caused by the request rather than the infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SandboxError::InvalidLanguage { .. }
                | SandboxError::CodeNotText
                | SandboxError::CodeTooLong { .. }
                | SandboxError::InvalidRequest(_)
        )
    }
}

/// Result type alias for snipbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;
