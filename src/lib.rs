//! snipbox: run untrusted code snippets in resource-bounded containers
//!
//! A snippet arrives over HTTP (or the CLI), is wrapped in language-specific
//! guarding code, written to a private per-job workspace, executed in a
//! throwaway container with a fixed resource envelope, and returned as
//! sanitized text. The workspace is removed on every exit path.
//!
//! # Architecture
//!
//! ## Language Support ([`judge`])
//! - [`judge::registry`]: Language profiles (image, script name, run command)
//! - [`judge::wrapper`]: Source wrapping templates
//!
//! ## Execution Control ([`exec`])
//! - [`exec::engine`]: validate -> wrap -> run -> sanitize pipeline
//! - [`exec::runtime`]: Injected sandbox runtime seam
//! - [`exec::docker`]: Docker CLI runtime and resource envelope
//! - [`exec::process`]: Deadline enforcement and process-group kill
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::workspace`]: Scoped per-job workspaces
//! - [`safety::cleanup`]: Idempotent tree removal
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured audit events
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Limits, requests, results and the error type
//! - [`config::loader`]: JSON configuration loading
//! - [`config::validator`]: Startup validation
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded capture and output sanitizing
//!
//! ## Surfaces
//! - [`server`]: axum HTTP service
//! - [`cli`]: clap command line
//!
//! # Design Principles
//!
//! 1. **Snippet faults are output** - Only validation and infrastructure fail
//! 2. **Cleanup is unconditional** - And never masks the real result
//! 3. **Limits are not negotiable** - Callers cannot widen the envelope
//! 4. **Runtime is a capability** - The engine never names Docker directly

// Language Support
pub mod judge;

// Execution Control
pub mod exec;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// HTTP service
pub mod server;

// CLI entrypoint wiring for the snipbox binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::loader::EngineConfig;
pub use config::types::*;
pub use exec::Engine;
