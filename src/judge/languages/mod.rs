//! Built-in language profiles.

pub mod javascript;
pub mod python;
