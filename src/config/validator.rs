// Config validation
// Startup must fail fast with actionable errors; soft problems become warnings.

use crate::config::loader::EngineConfig;
use crate::config::types::{Result, SandboxError};
use crate::judge::registry::LanguageRegistry;

/// Docker refuses memory limits below 6 MiB.
const DOCKER_MIN_MEMORY_MB: u64 = 6;

/// 1 TiB; anything above is a typo.
const MAX_MEMORY_MB: u64 = 1024 * 1024;

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Validate config at startup. Errors are fatal; warnings are returned for logging.
pub fn validate_config(config: &EngineConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_paths(config, &mut result);
    validate_images(config, &mut result);

    if !result.is_valid() {
        return Err(SandboxError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &EngineConfig, result: &mut ValidationResult) {
    let limits = &config.limits;

    if limits.timeout_secs == 0 {
        result.add_error("timeout_secs cannot be zero".to_string());
    } else if limits.timeout_secs > 300 {
        result.add_warning(format!(
            "timeout_secs {} is very high; each job holds a worker thread that long",
            limits.timeout_secs
        ));
    }

    if limits.memory_mb < DOCKER_MIN_MEMORY_MB {
        result.add_error(format!(
            "memory_mb {} is below the container runtime minimum of {} MiB",
            limits.memory_mb, DOCKER_MIN_MEMORY_MB
        ));
    } else if limits.memory_mb > MAX_MEMORY_MB {
        result.add_error(format!(
            "memory_mb {} exceeds the maximum of {} MiB",
            limits.memory_mb, MAX_MEMORY_MB
        ));
    }

    if !limits.cpus.is_finite() || limits.cpus <= 0.0 {
        result.add_error(format!("cpus must be a positive number, got {}", limits.cpus));
    }

    if limits.pids_limit == 0 {
        result.add_error("pids_limit cannot be zero".to_string());
    } else if limits.pids_limit < 4 {
        result.add_warning(format!(
            "pids_limit {} may be too low for interpreter startup",
            limits.pids_limit
        ));
    }

    if limits.output_limit_chars == 0 {
        result.add_error("output_limit_chars cannot be zero".to_string());
    }

    if limits.max_code_chars == 0 {
        result.add_warning("max_code_chars is zero; only empty snippets will be accepted".to_string());
    }
}

fn validate_paths(config: &EngineConfig, result: &mut ValidationResult) {
    if config.docker_binary.trim().is_empty() {
        result.add_error("docker_binary cannot be empty".to_string());
    }

    if !config.workspace_root.is_absolute() {
        result.add_error(format!(
            "workspace_root must be an absolute path, got {}",
            config.workspace_root.display()
        ));
    } else if !config.workspace_root.exists() {
        result.add_warning(format!(
            "workspace_root {} does not exist and will be created",
            config.workspace_root.display()
        ));
    }
}

fn validate_images(config: &EngineConfig, result: &mut ValidationResult) {
    let registry = LanguageRegistry::new();
    for (language, image) in &config.images {
        if !registry.contains(language) {
            result.add_error(format!(
                "image override for unknown language '{}' (known: {})",
                language,
                registry.ids().collect::<Vec<_>>().join(", ")
            ));
        }
        if image.trim().is_empty() {
            result.add_error(format!("image override for '{}' is empty", language));
        }
    }
}
