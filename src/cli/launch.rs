//! `launch` command: start `serve` and stay attached until it exits.

use std::{
    path::{Path, PathBuf},
    process::{Child, Command},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{
    cli::LaunchArgs,
    config::AppConfig,
    core::is_shutdown,
    debug,
    launch::{self, SpawnOptions, resolve_binary, serve_command, spawn_serve},
    log,
};

/// How often the child and the shutdown flag are polled.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit code reported when the server was stopped by Ctrl+C.
const INTERRUPTED: i32 = 130;

/// Run the launch command, returning the server's exit code.
pub fn run_launch(args: &LaunchArgs, config: &AppConfig) -> Result<i32> {
    let options = config.serve.clone().overlay(args.serve_options());
    let dir = args
        .dir
        .clone()
        .or_else(|| config.launch.dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let bin = args.bin.as_deref().or(config.launch.bin.as_deref());

    let mut spawn = SpawnOptions::new()
        .env_clear(config.launch.env_clear)
        .envs(&config.launch.env)
        .stdin(args.stdin.unwrap_or_default())
        .stdout(args.stdout.unwrap_or_default())
        .stderr(args.stderr.unwrap_or_default());
    if let Some(cwd) = &config.launch.cwd {
        spawn = spawn.cwd(cwd);
    }

    if args.dry {
        let program = resolve_binary(bin)?;
        println!("{}", format_command(&serve_command(&program, &dir, &options, &spawn)));
        return Ok(0);
    }

    debug!("launch"; "options: {:?}", options);
    log!("launch"; "serving {}", dir.display());

    let child = match bin {
        None => launch::serve(&dir, &options, &spawn)?,
        Some(bin) => spawn_serve(&resolve_binary(Some(bin))?, &dir, &options, &spawn)?,
    };

    wait_for_exit(child)
}

/// Block until the child exits, killing it once shutdown is requested.
fn wait_for_exit(mut child: Child) -> Result<i32> {
    let pid = child.id();
    loop {
        if let Some(status) = child.try_wait().context("Failed to poll server process")? {
            debug!("launch"; "server {} exited: {}", pid, status);
            return Ok(status.code().unwrap_or(1));
        }

        if is_shutdown() {
            log!("launch"; "stopping server");
            // The child usually got the same Ctrl+C and is already gone
            let _ = child.kill();
            child.wait().context("Failed to wait for server process")?;
            return Ok(INTERRUPTED);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Render a command as a shell-like line, quoting arguments with spaces.
fn format_command(cmd: &Command) -> String {
    let program = Path::new(cmd.get_program()).display().to_string();
    cmd.get_args()
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{arg}'")
            } else {
                arg.into_owned()
            }
        })
        .fold(program, |mut line, arg| {
            line.push(' ');
            line.push_str(&arg);
            line
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::ServeOptions;

    #[test]
    fn test_format_command() {
        let options = ServeOptions {
            port: Some(8080),
            redirect: Some("/not found.html".into()),
            ..Default::default()
        };
        let cmd = serve_command(Path::new("/opt/serve"), "/srv/my site", &options, &SpawnOptions::new());
        assert_eq!(
            format_command(&cmd),
            "/opt/serve --port 8080 --redirect '/not found.html' '/srv/my site'"
        );
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let args = LaunchArgs {
            dir: Some(PathBuf::from("/site")),
            bin: Some(PathBuf::from("/nonexistent/serve")),
            dry: true,
            ..Default::default()
        };
        assert_eq!(run_launch(&args, &AppConfig::default()).unwrap(), 0);
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let args = LaunchArgs {
            dir: Some(PathBuf::from("/site")),
            bin: Some(PathBuf::from("/nonexistent/serve")),
            ..Default::default()
        };
        let err = run_launch(&args, &AppConfig::default()).unwrap_err();
        assert!(err.downcast_ref::<launch::spawn::LaunchError>().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_is_forwarded() {
        let args = LaunchArgs {
            bin: Some(PathBuf::from("false")),
            ..Default::default()
        };
        assert_eq!(run_launch(&args, &AppConfig::default()).unwrap(), 1);
    }
}
