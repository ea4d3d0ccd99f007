//! Command-line interface module.

mod args;
pub mod launch;
pub mod listen;

pub use args::{Cli, Commands, LaunchArgs, ListenArgs};
