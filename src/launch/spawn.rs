//! Starting the external `serve` process.
//!
//! Provides a builder for the spawn configuration (stdio wiring, environment,
//! working directory) that is passed through to the child unchanged, and the
//! `serve` entry point that ties it to [`build_args`].
//!
//! # Examples
//!
//! ```ignore
//! use crate::launch::{serve, ServeOptions, SpawnOptions, StdioMode};
//!
//! // Inherit the terminal
//! let child = serve("public", &ServeOptions::default(), &SpawnOptions::default())?;
//!
//! // Capture output, custom environment
//! let child = serve(
//!     "public",
//!     &options,
//!     &SpawnOptions::new().stdout(StdioMode::Piped).env("TZ", "UTC"),
//! )?;
//! ```
//!
//! The returned [`Child`] belongs to the caller: it is neither waited on nor
//! read from here.

use std::{
    env::consts::EXE_SUFFIX,
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use clap::ValueEnum;
use thiserror::Error;

use super::args::build_args;
use super::options::ServeOptions;

/// File name of the server binary, installed next to this executable.
pub const SERVE_BIN: &str = "serve";

/// Launch errors. Bad option values are not among them: `serve` reports those.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to locate the running executable")]
    CurrentExe(#[source] io::Error),

    #[error("`{0}` was not found on PATH")]
    NotOnPath(String, #[source] which::Error),

    #[error("failed to spawn `{program}`")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Spawn options
// ============================================================================

/// How one standard stream of the child is wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StdioMode {
    #[default]
    Inherit,
    Piped,
    Null,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Piped => Stdio::piped(),
            Self::Null => Stdio::null(),
        }
    }
}

/// Process-spawn configuration passed through to the child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnOptions {
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    env_clear: bool,
    stdin: StdioMode,
    stdout: StdioMode,
    stderr: StdioMode,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set working directory of the child.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Add one environment variable.
    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Add several environment variables.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self = self.env(k, v);
        }
        self
    }

    /// Start the child with an empty environment (plus any `env` entries).
    pub fn env_clear(mut self, clear: bool) -> Self {
        self.env_clear = clear;
        self
    }

    pub fn stdin(mut self, mode: StdioMode) -> Self {
        self.stdin = mode;
        self
    }

    pub fn stdout(mut self, mode: StdioMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn stderr(mut self, mode: StdioMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Apply this configuration to a command.
    fn apply(&self, cmd: &mut Command) {
        if self.env_clear {
            cmd.env_clear();
        }
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(self.stdin.to_stdio())
            .stdout(self.stdout.to_stdio())
            .stderr(self.stderr.to_stdio());
    }
}

// ============================================================================
// Binary resolution
// ============================================================================

/// Locate the `serve` binary.
///
/// - no override: `serve` next to the running executable, independent of
///   the caller's working directory
/// - bare name (`serve`, `my-serve`): looked up on `PATH`
/// - anything with a directory component: used as given
pub fn resolve_binary(bin: Option<&Path>) -> Result<PathBuf, LaunchError> {
    match bin {
        Some(bin) if is_bare_name(bin) => {
            let name = bin.to_string_lossy().into_owned();
            which::which(bin).map_err(|e| LaunchError::NotOnPath(name, e))
        }
        Some(bin) => Ok(bin.to_path_buf()),
        None => {
            let exe = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
            let dir = exe.parent().unwrap_or_else(|| Path::new("."));
            Ok(dir.join(format!("{SERVE_BIN}{EXE_SUFFIX}")))
        }
    }
}

fn is_bare_name(path: &Path) -> bool {
    path.parent().is_some_and(|p| p.as_os_str().is_empty()) && !path.is_absolute()
}

// ============================================================================
// Entry points
// ============================================================================

/// Build the command that starts `bin` for `dir`, without spawning it.
pub fn serve_command(
    bin: &Path,
    dir: impl AsRef<OsStr>,
    options: &ServeOptions,
    spawn: &SpawnOptions,
) -> Command {
    let mut cmd = Command::new(bin);
    cmd.args(build_args(options, dir));
    spawn.apply(&mut cmd);
    cmd
}

/// Start a specific `serve` binary and return its handle unmodified.
pub fn spawn_serve(
    bin: &Path,
    dir: impl AsRef<OsStr>,
    options: &ServeOptions,
    spawn: &SpawnOptions,
) -> Result<Child, LaunchError> {
    serve_command(bin, dir, options, spawn)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: bin.to_path_buf(),
            source,
        })
}

/// Start the `serve` installed next to this executable.
pub fn serve(
    dir: impl AsRef<OsStr>,
    options: &ServeOptions,
    spawn: &SpawnOptions,
) -> Result<Child, LaunchError> {
    let bin = resolve_binary(None)?;
    spawn_serve(&bin, dir, options, spawn)
}

// ============================================================================
// Tests
// ============================================================================
