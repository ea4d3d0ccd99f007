//! `[launch]` section configuration.
//!
//! Where and how the `serve` binary is started. The flags it receives come
//! from `[serve]`.
//!
//! # Example
//!
//! ```toml
//! [launch]
//! dir = "public"          # Directory to serve (relative to this file)
//! bin = "serve"           # Binary: bare name = PATH lookup, path = as given
//! cwd = "."               # Working directory of the server process
//! env_clear = false       # Start from an empty environment
//!
//! [launch.env]
//! TZ = "UTC"              # Extra environment for the server process
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Server process settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Directory to serve.
    pub dir: Option<PathBuf>,

    /// `serve` binary override. Unset: next to this executable.
    pub bin: Option<PathBuf>,

    /// Working directory of the server process. Unset: inherited.
    pub cwd: Option<PathBuf>,

    /// Do not inherit this process's environment.
    pub env_clear: bool,

    /// Extra environment variables for the server process.
    pub env: BTreeMap<String, String>,
}
