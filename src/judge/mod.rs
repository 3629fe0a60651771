//! Language support.
//!
//! The rest of the pipeline is language-agnostic. Profiles define the image,
//! script name and run command for each language; the wrapper embeds the
//! snippet in its guarding template.

pub mod languages;
pub mod registry;
pub mod wrapper;

pub use registry::{LanguageProfile, LanguageRegistry};
pub use wrapper::{wrap, WrapperKind};
