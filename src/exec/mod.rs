//! Execution control
//!
//! The engine pipeline, the runtime seam and its Docker implementation.

pub mod docker;
pub mod engine;
pub mod process;
pub mod runtime;

pub use engine::Engine;
pub use runtime::{RunOutcome, SandboxJob, SandboxRuntime};
