//! Configuration sections of `serve-hmr.toml`.
//!
//! | Section    | Purpose                                        |
//! |------------|------------------------------------------------|
//! | `[launch]` | Served directory, binary, server environment   |
//! | `[serve]`  | Flags for `serve` (see `launch::ServeOptions`) |
//! | `[client]` | Hot reload client: origin, page, reconnect     |

mod client;
mod launch;

pub use client::ClientConfig;
pub use launch::LaunchConfig;
