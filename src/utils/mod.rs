//! Utilities
//!
//! Output capture and normalization.

pub mod output;
