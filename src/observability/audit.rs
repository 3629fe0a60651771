/// Structured audit events for sandbox jobs
///
/// Every event is written as one JSON object on the `snipbox::audit` log
/// target, so operators can route it separately with `RUST_LOG`.
use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log target for audit records
pub const AUDIT_TARGET: &str = "snipbox::audit";

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Types of events we track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    // Lifecycle
    ExecutionStart,
    ExecutionEnd,

    // Limits and termination
    WallTimeLimitViolation,
    ForcedKill,

    // Infrastructure
    RuntimeFailure,
    CleanupFailure,

    // Edge
    RequestRejected,
}

impl AuditEventType {
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::ExecutionStart => AuditSeverity::Low,
            AuditEventType::ExecutionEnd => AuditSeverity::Low,
            AuditEventType::WallTimeLimitViolation => AuditSeverity::Medium,
            AuditEventType::ForcedKill => AuditSeverity::High,
            AuditEventType::RuntimeFailure => AuditSeverity::High,
            AuditEventType::CleanupFailure => AuditSeverity::Critical,
            AuditEventType::RequestRejected => AuditSeverity::Low,
        }
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub job_id: Option<Uuid>,
    pub language: Option<String>,
    pub details: String,
    pub process_id: u32,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: impl Into<String>) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            job_id: None,
            language: None,
            details: details.into(),
            process_id: std::process::id(),
        }
    }

    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"event_type\":\"{:?}\",\"details\":\"unserializable audit event: {}\"}}",
                self.event_type, e
            )
        })
    }
}

/// Emit an event at a level matching its severity
pub fn emit(event: AuditEvent) {
    let line = event.to_json();
    match event.severity {
        AuditSeverity::Critical | AuditSeverity::High => error!(target: AUDIT_TARGET, "{}", line),
        AuditSeverity::Medium => warn!(target: AUDIT_TARGET, "{}", line),
        AuditSeverity::Low => info!(target: AUDIT_TARGET, "{}", line),
    }
}

/// Convenience constructors for the events the engine raises
pub mod events {
    use super::*;

    pub fn execution_start(job_id: Uuid, language: &str, runtime: &str) {
        emit(
            AuditEvent::new(
                AuditEventType::ExecutionStart,
                format!("Execution started on runtime {}", runtime),
            )
            .with_job_id(job_id)
            .with_language(language),
        );
    }

    pub fn execution_end(job_id: Uuid, language: &str, exit_code: Option<i32>, wall_time_ms: u64) {
        emit(
            AuditEvent::new(
                AuditEventType::ExecutionEnd,
                format!(
                    "Execution ended: exit_code={:?}, wall_time_ms={}",
                    exit_code, wall_time_ms
                ),
            )
            .with_job_id(job_id)
            .with_language(language),
        );
    }

    pub fn wall_time_limit_violation(job_id: Uuid, language: &str, used_ms: u64, limit_ms: u64) {
        emit(
            AuditEvent::new(
                AuditEventType::WallTimeLimitViolation,
                format!("Wall time limit exceeded: {}ms > {}ms", used_ms, limit_ms),
            )
            .with_job_id(job_id)
            .with_language(language),
        );
    }

    pub fn forced_kill(job_id: Uuid, reason: &str) {
        emit(
            AuditEvent::new(AuditEventType::ForcedKill, format!("Forced kill: {}", reason))
                .with_job_id(job_id),
        );
    }

    pub fn runtime_failure(job_id: Uuid, language: &str, error: &str) {
        emit(
            AuditEvent::new(
                AuditEventType::RuntimeFailure,
                format!("Sandbox runtime failed: {}", error),
            )
            .with_job_id(job_id)
            .with_language(language),
        );
    }

    pub fn cleanup_failure(job_id: Uuid, error: &str) {
        emit(
            AuditEvent::new(AuditEventType::CleanupFailure, format!("Cleanup failed: {}", error))
                .with_job_id(job_id),
        );
    }

    pub fn request_rejected(language: Option<&str>, reason: &str) {
        let mut event = AuditEvent::new(
            AuditEventType::RequestRejected,
            format!("Request rejected: {}", reason),
        );
        if let Some(language) = language {
            event = event.with_language(language);
        }
        emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let job_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditEventType::ForcedKill, "deadline")
            .with_job_id(job_id)
            .with_language("python");
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();

        assert_eq!(value["event_type"], "ForcedKill");
        assert_eq!(value["severity"], "High");
        assert_eq!(value["job_id"], job_id.to_string());
        assert_eq!(value["language"], "python");
        assert_eq!(value["details"], "deadline");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_cleanup_failure_is_critical() {
        assert_eq!(
            AuditEventType::CleanupFailure.default_severity(),
            AuditSeverity::Critical
        );
        let event = AuditEvent::new(AuditEventType::CleanupFailure, "x")
            .with_severity(AuditSeverity::Low);
        assert_eq!(event.severity, AuditSeverity::Low);
    }
}
