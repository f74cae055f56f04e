//! ---
//! km_section: "01-core-functionality"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Shared configuration and tracing bootstrap."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_private_space() -> PathBuf {
    PathBuf::from("keystore/private")
}

fn default_public_space() -> PathBuf {
    PathBuf::from("keystore/public")
}

fn default_max_iterations() -> usize {
    256
}

fn default_verify_artifacts() -> bool {
    true
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for a keymint run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeymintConfig {
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`KeymintConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: KeymintConfig,
    pub source: PathBuf,
}

impl KeymintConfig {
    pub const ENV_CONFIG_PATH: &'static str = "KEYMINT_CONFIG";

    /// Load configuration from disk, respecting the `KEYMINT_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<KeymintConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.keystore.validate()?;
        if self.defaults.max_iterations == 0 {
            return Err(anyhow!("defaults.max_iterations must be at least 1"));
        }
        Ok(())
    }
}

impl std::str::FromStr for KeymintConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: KeymintConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Directories holding certificate-authority material, keyed by issuer name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    #[serde(default = "default_private_space")]
    pub private_space: PathBuf,
    #[serde(default = "default_public_space")]
    pub public_space: PathBuf,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            private_space: default_private_space(),
            public_space: default_public_space(),
        }
    }
}

impl KeystoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.private_space.as_os_str().is_empty() {
            return Err(anyhow!("keystore.private_space must not be empty"));
        }
        if self.public_space.as_os_str().is_empty() {
            return Err(anyhow!("keystore.public_space must not be empty"));
        }
        Ok(())
    }
}

/// Bounds applied to the defaults repair loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Post-compilation handling of generated artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Validate compiled documents against the DDS output schemas.
    #[serde(default = "default_verify_artifacts")]
    pub verify: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            verify: default_verify_artifacts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When set, a daily rolling JSON log file is written here.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
