//! Safety and cleanup
//!
//! Per-job workspaces and their unconditional teardown.

pub mod cleanup;
pub mod workspace;
