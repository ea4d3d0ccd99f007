//! Configuration management for `serve-hmr.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [launch] and [client]
//! ├── error          # ConfigError
//! └── mod.rs         # AppConfig (this file)
//! ```
//!
//! `[serve]` is deserialized straight into `launch::ServeOptions`.
//!
//! A missing config file is not an error: every setting has a default or can
//! be given on the command line, which always wins over the file.

pub mod section;

mod error;

pub use error::ConfigError;
pub use section::{ClientConfig, LaunchConfig};

use crate::launch::ServeOptions;
use crate::log;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing serve-hmr.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Server process settings
    #[serde(default)]
    pub launch: LaunchConfig,

    /// Flags passed to `serve`
    #[serde(default)]
    pub serve: ServeOptions,

    /// Hot reload client settings
    #[serde(default)]
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load configuration, searching upward from cwd for `config_name`.
    pub fn load(config_name: &Path) -> Result<Self> {
        let Some(path) = find_config_file(config_name) else {
            crate::debug!("config"; "no {} found, using defaults", config_name.display());
            return Ok(Self::default());
        };

        let mut config = Self::from_path(&path)?;

        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.normalize_paths(&root);
        config.config_path = Some(path);
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("Failed to parse `{}`", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored): {}", display_path, fields.join(", "));
    }

    /// Resolve relative paths against the config file's directory.
    ///
    /// A bare `bin` name is left alone: it is looked up on PATH at launch.
    fn normalize_paths(&mut self, root: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };

        if let Some(dir) = self.launch.dir.as_mut() {
            resolve(dir);
        }
        if let Some(cwd) = self.launch.cwd.as_mut() {
            resolve(cwd);
        }
        if let Some(bin) = self.launch.bin.as_mut()
            && bin.components().count() > 1
        {
            resolve(bin);
        }
        if let Some(page) = self.client.page.as_mut() {
            resolve(page);
        }
    }
}

/// Find config file by searching upward from current directory
///
/// An absolute `config_name` is used as-is when it exists.
fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AppConfig {
    let (parsed, ignored) = AppConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
