//! Configuration
//!
//! Limits and error types, JSON loading, and startup validation.

pub mod loader;
pub mod types;
pub mod validator;
