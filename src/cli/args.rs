//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::launch::{CacheHeaders, HmrOptions, LogLevel, ServeOptions, ServerCache, StdioMode};

/// Launcher and hot-reload listener for the `serve` static file server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "serve-hmr.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the `serve` binary with flags built from config and options
    #[command(visible_alias = "l")]
    Launch {
        #[command(flatten)]
        args: LaunchArgs,
    },

    /// Connect to a running server and print file change notifications
    #[command(visible_alias = "w")]
    Listen {
        #[command(flatten)]
        args: ListenArgs,
    },
}

/// Launch command arguments.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Directory to serve (default: `[launch] dir`, then the current directory)
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Server log level
    #[arg(short, long, value_enum)]
    pub loglevel: Option<LogLevel>,

    /// Redirect all unmatched routes to this URL
    #[arg(short, long, value_hint = clap::ValueHint::Url)]
    pub redirect: Option<String>,

    /// Watch served files and push change notifications
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Reload pages automatically on change
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub auto_reload: Option<bool>,

    /// `max-age` for the Cache-Control header, in seconds
    #[arg(long = "maxage")]
    pub max_age: Option<u64>,

    /// Disable HTTP caching
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub nocache: Option<bool>,

    /// Disable ETag generation
    #[arg(long = "noetag", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub no_etag: Option<bool>,

    /// Maximum size of the in-memory cache, in MB
    #[arg(long)]
    pub cache_max: Option<u64>,

    /// Maximum size of a single cached file, in MB
    #[arg(long)]
    pub cache_flimit: Option<u64>,

    /// `serve` binary to run: a path, or a name looked up on PATH
    #[arg(short, long, value_hint = clap::ValueHint::ExecutablePath)]
    pub bin: Option<PathBuf>,

    /// How the server's stdin is wired
    #[arg(long, value_enum)]
    pub stdin: Option<StdioMode>,

    /// How the server's stdout is wired
    #[arg(long, value_enum)]
    pub stdout: Option<StdioMode>,

    /// How the server's stderr is wired
    #[arg(long, value_enum)]
    pub stderr: Option<StdioMode>,

    /// Print the command line instead of starting the server
    #[arg(short, long)]
    pub dry: bool,
}

impl LaunchArgs {
    /// Options given on the command line, to be layered over the config file.
    pub fn serve_options(&self) -> ServeOptions {
        let hmr = (self.watch.is_some() || self.auto_reload.is_some()).then(|| HmrOptions {
            watch: self.watch,
            auto_reload: self.auto_reload,
        });
        let cache_headers = (self.max_age.is_some() || self.nocache.is_some() || self.no_etag.is_some())
            .then(|| CacheHeaders {
                max_age: self.max_age,
                nocache: self.nocache,
                no_etag: self.no_etag,
            });
        let server_cache = (self.cache_max.is_some() || self.cache_flimit.is_some()).then(|| {
            ServerCache {
                max: self.cache_max,
                f_limit: self.cache_flimit,
            }
        });

        ServeOptions {
            port: self.port,
            loglevel: self.loglevel,
            redirect: self.redirect.clone(),
            hmr,
            cache_headers,
            server_cache,
        }
    }
}

/// Listen command arguments.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ListenArgs {
    /// Page origin of the running server (e.g. http://localhost:8080)
    #[arg(value_hint = clap::ValueHint::Url)]
    pub url: Option<String>,

    /// Saved HTML page whose `_serve:fname` marks the current page
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub page: Option<PathBuf>,

    /// Only report changes to the current page (requires --page)
    #[arg(short = 'c', long, requires = "page")]
    pub current_only: bool,

    /// Print one JSON object per notification
    #[arg(short, long)]
    pub json: bool,

    /// Exit after the first notification
    #[arg(short, long)]
    pub once: bool,

    /// Stop when the connection drops instead of reconnecting
    #[arg(long)]
    pub no_reconnect: bool,
}
