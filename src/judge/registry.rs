//! Language profile registry.
//!
//! The registry is the single source of truth for which languages are
//! supported. It is built once at startup and never mutated afterwards.

use crate::config::types::{Result, SandboxError};
use crate::judge::languages::{javascript, python};
use crate::judge::wrapper::WrapperKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Mount point of the workspace inside the sandbox.
pub const SANDBOX_CODE_DIR: &str = "/code";

/// Everything needed to prepare and launch one language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageProfile {
    /// Registry key, as sent by callers (e.g. "python", "js")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Container image reference
    pub image_ref: String,
    /// Name of the wrapped source file inside the workspace
    pub script_filename: String,
    /// argv for the in-container entrypoint
    pub run_command: Vec<String>,
    /// Wrapper template applied to the snippet
    pub wrapper: WrapperKind,
}

impl LanguageProfile {
    /// Path of the source file as seen from inside the sandbox.
    pub fn sandbox_script_path(&self) -> String {
        format!("{}/{}", SANDBOX_CODE_DIR, self.script_filename)
    }
}

/// Immutable id -> profile mapping
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: BTreeMap<String, LanguageProfile>,
}

impl LanguageRegistry {
    /// Registry with the built-in profiles.
    pub fn new() -> Self {
        let mut registry = Self {
            profiles: BTreeMap::new(),
        };

        registry.register(python::profile());
        registry.register(javascript::profile());

        registry
    }

    /// Built-in profiles with image references replaced from configuration.
    pub fn with_image_overrides(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (id, image) in overrides {
            let profile = registry.profiles.get_mut(id).ok_or_else(|| {
                SandboxError::Config(format!("image override for unknown language '{}'", id))
            })?;
            log::info!(
                "Image override for {}: {} -> {}",
                id,
                profile.image_ref,
                image
            );
            profile.image_ref = image.clone();
        }
        Ok(registry)
    }

    fn register(&mut self, profile: LanguageProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Pure lookup.
    pub fn resolve(&self, id: &str) -> Option<&LanguageProfile> {
        self.profiles.get(id)
    }

    /// Lookup that fails with the client-facing `InvalidLanguage` error.
    pub fn validate(&self, id: &str) -> Result<&LanguageProfile> {
        self.resolve(id).ok_or_else(|| SandboxError::InvalidLanguage {
            language: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    /// Supported ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
