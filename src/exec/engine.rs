/// Execution engine
///
/// validate -> wrap -> workspace -> runtime -> sanitize -> teardown.
/// The engine is immutable after construction and shared across request
/// threads behind an `Arc`.
use crate::config::loader::EngineConfig;
use crate::config::types::{ExecutionRequest, ExecutionResult, Result, SandboxError};
use crate::exec::docker::DockerRuntime;
use crate::exec::runtime::{RunOutcome, SandboxJob, SandboxRuntime};
use crate::judge::registry::{LanguageProfile, LanguageRegistry};
use crate::judge::wrapper;
use crate::observability::audit;
use crate::safety::workspace::WorkspaceManager;
use crate::utils::output;
use std::sync::Arc;
use uuid::Uuid;

pub struct Engine {
    config: EngineConfig,
    registry: LanguageRegistry,
    workspaces: WorkspaceManager,
    runtime: Arc<dyn SandboxRuntime>,
}

impl Engine {
    /// Engine backed by the Docker CLI named in `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let runtime = Arc::new(DockerRuntime::new(config.docker_binary.clone()));
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: EngineConfig, runtime: Arc<dyn SandboxRuntime>) -> Result<Self> {
        let registry = LanguageRegistry::with_image_overrides(&config.images)?;
        let workspaces = WorkspaceManager::new(config.workspace_root.clone())?;

        log::info!(
            "Engine ready: runtime={}, languages=[{}], workspace_root={}",
            runtime.name(),
            registry.ids().collect::<Vec<_>>().join(", "),
            workspaces.root().display()
        );

        Ok(Self {
            config,
            registry,
            workspaces,
            runtime,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Request checks, in order: language, then length.
    ///
    /// Runs before any workspace exists, so a rejected request has no side
    /// effects beyond the audit record.
    pub fn validate(&self, request: &ExecutionRequest) -> Result<&LanguageProfile> {
        let result = self.check(request);
        if let Err(e) = &result {
            audit::events::request_rejected(Some(&request.language), &e.to_string());
        }
        result
    }

    fn check(&self, request: &ExecutionRequest) -> Result<&LanguageProfile> {
        let profile = self.registry.validate(&request.language)?;

        let length = request.code_chars();
        let max = self.config.limits.max_code_chars;
        if length > max {
            return Err(SandboxError::CodeTooLong { length, max });
        }

        Ok(profile)
    }

    /// Run one snippet.
    ///
    /// Snippet faults and timeouts are `Ok`; only validation and
    /// infrastructure problems are `Err`. The workspace is gone by the time
    /// this returns.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let profile = self.validate(request)?;
        let limits = &self.config.limits;
        let job_id = Uuid::new_v4();

        let source = wrapper::wrap(&request.source_code, profile, limits);
        audit::events::execution_start(job_id, &profile.id, self.runtime.name());

        let outcome = self
            .workspaces
            .with_workspace(job_id, profile, &source, |dir| {
                let job = SandboxJob {
                    job_id,
                    workspace: dir,
                    profile,
                    limits,
                };
                self.runtime.run(&job)
            });

        match outcome {
            Ok(RunOutcome::Completed {
                stdout,
                stderr,
                exit_code,
                wall_time,
            }) => {
                let captured = output::combine(&stdout, &stderr);
                let wall_time_ms = wall_time.as_millis() as u64;
                audit::events::execution_end(job_id, &profile.id, exit_code, wall_time_ms);

                Ok(ExecutionResult {
                    job_id,
                    output: output::render(&captured, limits.output_limit_chars),
                    timed_out: false,
                    exit_code,
                    wall_time_ms,
                })
            }
            Ok(RunOutcome::TimedOut { wall_time }) => {
                let wall_time_ms = wall_time.as_millis() as u64;
                audit::events::wall_time_limit_violation(
                    job_id,
                    &profile.id,
                    wall_time_ms,
                    limits.timeout().as_millis() as u64,
                );
                Ok(ExecutionResult::timed_out(job_id, wall_time_ms))
            }
            Err(e) => {
                log::error!("Job {} ({}) failed: {}", job_id, profile.id, e);
                audit::events::runtime_failure(job_id, &profile.id, &e.to_string());
                Err(e)
            }
        }
    }
}
