//! Configuration service implementation.
//!
//! Loads the root configuration from `config.toml` and caches it. A missing
//! file is created with default values.

use crate::paths::LaunchpadPaths;
use launchpad_core::config::RootConfig;
use launchpad_core::error::{LaunchpadError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the default location (`~/.config/launchpad/config.toml`).
    pub fn new() -> Result<Self> {
        let path = LaunchpadPaths::config_file().map_err(|e| LaunchpadError::config(e.to_string()))?;
        Ok(Self::at(path))
    }

    /// Creates a service reading an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<RootConfig> {
        if let Some(cached) = self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            return Ok(cached.clone());
        }

        let loaded = Self::load_from(&self.path)?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Reads `path`, writing a default configuration first when it is missing.
    pub fn load_from(path: &Path) -> Result<RootConfig> {
        if !path.exists() {
            let default_config = RootConfig::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(&default_config)?)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)?;
        let config: RootConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}
