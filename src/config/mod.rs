// src/config/mod.rs

//! Configuration loading.
//!
//! - [`model`] holds the raw serde types and the validated types.
//! - [`validate`] turns raw types into validated ones.
//! - [`loader`] reads files and resolves the application root.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_app_config, load_scripts, load_settings, resolve_app_root};
pub use model::{
    AppConfig, RawScriptDescriptor, RawSettingsFile, RunnerSection, RunnerSettings,
    ScriptDescriptor,
};
pub use validate::validate_scripts;
