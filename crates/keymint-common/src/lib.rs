//! ---
//! km_section: "01-core-functionality"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Shared configuration and tracing bootstrap."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Shared primitives for the keymint workspace: configuration loading and
//! tracing bootstrap consumed by the pipeline crate and its embedders.
//!
//! Embedders normally go through `KeystoreBuilder::bootstrap` in
//! `keymint-core`, which calls [`KeymintConfig::load_with_source`] and then
//! [`init_tracing`] once per process. Callers that assemble their own builder
//! should invoke [`KeymintConfig::load`] (or `load_with_source`) and
//! [`init_tracing`] themselves before the first build.

pub mod config;
pub mod logging;

pub use config::{
    ArtifactsConfig, DefaultsConfig, KeymintConfig, KeystoreConfig, LoadedConfig, LoggingConfig,
};
pub use logging::{init_tracing, LogFormat};
