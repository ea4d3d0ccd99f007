//! Launch configuration for the `serve` binary.
//!
//! Every field is optional; an absent field means "use the binary's own
//! default". The same shape is read from the `[serve]` config section:
//!
//! ```toml
//! [serve]
//! port = 8080
//! loglevel = "debug"
//! redirect = "/index.html"
//!
//! [serve.hmr]
//! watch = true
//! auto_reload = true
//!
//! [serve.cache_headers]
//! max_age = 3600
//! nocache = false
//! no_etag = false
//!
//! [serve.server_cache]
//! max = 100      # MB, all cached files
//! f_limit = 10   # MB, single cached file
//! ```

use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;

/// Log level accepted by `serve --loglevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Debug,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options translated into `serve` command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServeOptions {
    pub port: Option<u16>,
    pub loglevel: Option<LogLevel>,
    /// Redirect target for unmatched routes.
    pub redirect: Option<String>,
    pub hmr: Option<HmrOptions>,
    pub cache_headers: Option<CacheHeaders>,
    pub server_cache: Option<ServerCache>,
}

/// Hot reload toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HmrOptions {
    pub watch: Option<bool>,
    pub auto_reload: Option<bool>,
}

/// `Cache-Control` / `ETag` response header policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheHeaders {
    /// `max-age` in seconds.
    pub max_age: Option<u64>,
    pub nocache: Option<bool>,
    pub no_etag: Option<bool>,
}

/// In-memory cache limits, in megabytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerCache {
    pub max: Option<u64>,
    pub f_limit: Option<u64>,
}

impl ServeOptions {
    /// Layer `top` over `self`: every field set in `top` wins.
    pub fn overlay(self, top: Self) -> Self {
        Self {
            port: top.port.or(self.port),
            loglevel: top.loglevel.or(self.loglevel),
            redirect: top.redirect.or(self.redirect),
            hmr: merge_section(self.hmr, top.hmr, |base, top| HmrOptions {
                watch: top.watch.or(base.watch),
                auto_reload: top.auto_reload.or(base.auto_reload),
            }),
            cache_headers: merge_section(self.cache_headers, top.cache_headers, |base, top| {
                CacheHeaders {
                    max_age: top.max_age.or(base.max_age),
                    nocache: top.nocache.or(base.nocache),
                    no_etag: top.no_etag.or(base.no_etag),
                }
            }),
            server_cache: merge_section(self.server_cache, top.server_cache, |base, top| {
                ServerCache {
                    max: top.max.or(base.max),
                    f_limit: top.f_limit.or(base.f_limit),
                }
            }),
        }
    }
}

fn merge_section<T>(base: Option<T>, top: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, top) {
        (Some(base), Some(top)) => Some(merge(base, top)),
        (base, top) => top.or(base),
    }
}
