//! Application configuration management.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `FILEKEEP_*` environment variables, e.g. `FILEKEEP_HASH_BLOCK_SIZE=4096`

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::handle::HandleOptions;
use crate::hasher::{HashAlgorithm, DEFAULT_BLOCK_SIZE};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "FILEKEEP_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bytes read per digest update.
    pub hash_block_size: usize,
    /// Directory receiving backup archives; the working directory when unset.
    pub backup_dir: Option<PathBuf>,
    /// Algorithm used by `hash` when none is given.
    pub default_algorithm: HashAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_block_size: DEFAULT_BLOCK_SIZE,
            backup_dir: None,
            default_algorithm: HashAlgorithm::Sha256,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// `explicit` must exist if given; the platform default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load_from_path(path)
            }
            None => match Self::default_path() {
                Some(path) => Self::load_from_path(&path),
                None => {
                    log::debug!("No platform config directory, using defaults");
                    Self::load_layers(Figment::from(Serialized::defaults(Self::default())))
                }
            },
        }
    }

    /// Load defaults, then `path` (skipped when missing), then environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        log::debug!("Loading config from {}", path.display());
        Self::load_layers(
            Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path)),
        )
        .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    fn load_layers(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no operation can work with.
    pub fn validate(&self) -> Result<()> {
        if self.hash_block_size == 0 {
            anyhow::bail!("hash_block_size must be greater than zero");
        }
        Ok(())
    }

    /// Save the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "filekeep", "filekeep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Handle options carrying the configured block size.
    #[must_use]
    pub fn handle_options(&self) -> HandleOptions {
        HandleOptions::default().with_block_size(self.hash_block_size)
    }
}
