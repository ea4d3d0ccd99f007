//! Launch Module
//!
//! Starts the external `serve` binary from a typed configuration.
//!
//! ```text
//! ServeOptions --build_args--> ["--port", "8080", "--watch", "/site"] --spawn--> Child
//! ```
//!
//! # Modules
//!
//! - `options` - `ServeOptions` and its sections
//! - `args` - Deterministic flag mapping, directory last
//! - `spawn` - Binary resolution, spawn configuration, `serve()`

pub mod args;
pub mod options;
pub mod spawn;

pub use options::{CacheHeaders, HmrOptions, LogLevel, ServeOptions, ServerCache};
pub use spawn::{SpawnOptions, StdioMode, resolve_binary, serve, serve_command, spawn_serve};
