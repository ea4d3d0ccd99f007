//! `listen` command: print change notifications from a running server.
//!
//! Notifications are the only thing written to stdout. Status lines go
//! through `log!`, which writes to stderr.

use std::{
    io::{self, Write},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;

use crate::{
    cli::ListenArgs,
    config::AppConfig,
    debug,
    hmr::{
        self, ChangeKind, ChangeNotification, Dispatcher, HmrListener, ListenOptions, PageMeta,
        ReconnectPolicy, Subscription, endpoint_url,
    },
    log,
    logger::EventLine,
};

type Printer = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

/// Where notifications are printed.
type Output = Arc<Mutex<Box<dyn Write + Send>>>;

/// Run the listen command until the connection is gone or Ctrl+C.
pub fn run_listen(args: &ListenArgs, config: &AppConfig) -> Result<()> {
    let stdout: Box<dyn Write + Send> = Box::new(io::stdout());
    listen(args, config, hmr::global(), Arc::new(Mutex::new(stdout)))
}

fn listen(args: &ListenArgs, config: &AppConfig, dispatcher: &Dispatcher, out: Output) -> Result<()> {
    let Some(origin) = resolve_origin(args, config) else {
        bail!("no server to listen to: pass a URL, or set `[client] url` or `[serve] port`");
    };
    let url = endpoint_url(&origin)?;

    let page = args.page.as_deref().or(config.client.page.as_deref());
    let marker = page.map(load_marker).transpose()?.flatten();

    let reconnect = if args.no_reconnect {
        ReconnectPolicy::disabled()
    } else {
        config.client.reconnect.into()
    };

    let listener = HmrListener::new(url, dispatcher.clone()).with_reconnect(reconnect);

    let print = printer(args.json, out);
    // `--once` is decided here rather than per subscription: with
    // `--current-only`, changes to other files must not use it up
    let report: Printer = if args.once {
        let stop = listener.stop_handle();
        let done = AtomicBool::new(false);
        Arc::new(move |n: &ChangeNotification| {
            if !done.swap(true, Ordering::SeqCst) {
                print(n);
                stop.stop();
            }
        })
    } else {
        print
    };
    let options = ListenOptions::default();

    let mut subscriptions: Vec<Subscription> = Vec::new();
    if args.current_only {
        subscriptions.push(dispatcher.on_current_page_change(
            marker.as_ref(),
            forward(&report),
            options,
        ));
    } else {
        subscriptions.push(dispatcher.on_change(forward(&report), options));
        subscriptions.push(dispatcher.on_create(forward(&report), options));
        subscriptions.push(dispatcher.on_delete(forward(&report), options));
        subscriptions.push(dispatcher.on_rename(forward(&report), options));
        if !args.json && marker.is_some() {
            subscriptions.push(dispatcher.on_current_page_change(
                marker.as_ref(),
                |n| log!("hmr"; "current page changed: {}", n.path),
                options,
            ));
        }
    }

    let result = listener.run();

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    result.with_context(|| format!("Lost connection to {}", listener.url()))
}

fn forward(report: &Printer) -> impl Fn(&ChangeNotification) + Send + Sync + 'static {
    let report = Arc::clone(report);
    move |n: &ChangeNotification| report(n)
}

/// Server origin: the argument, then `[client] url`, then the configured port.
fn resolve_origin(args: &ListenArgs, config: &AppConfig) -> Option<String> {
    args.url
        .clone()
        .or_else(|| config.client.url.clone())
        .or_else(|| {
            config
                .serve
                .port
                .filter(|&port| port != 0)
                .map(|port| format!("http://localhost:{port}"))
        })
}

/// Read the current-page marker, warning when the page has none.
fn load_marker(path: &Path) -> Result<Option<PageMeta>> {
    let marker = PageMeta::from_file(path)?;
    match &marker {
        Some(meta) => debug!("hmr"; "current page: {} (mtime {:?}, size {:?})",
            meta.fname, meta.mtime, meta.fsize),
        None => log!(
            "warning";
            "{} has no `_serve:fname` tag, current page changes will not be reported",
            path.display()
        ),
    }
    Ok(marker)
}

/// One line per notification: JSON, or a timestamped `EventLine`.
fn printer(json: bool, out: Output) -> Printer {
    Arc::new(move |n: &ChangeNotification| {
        let mut out = out.lock();
        let written = if json {
            match n.to_json() {
                Ok(line) => writeln!(out, "{line}").and_then(|()| out.flush()),
                Err(e) => {
                    log!("error"; "failed to encode notification for {}: {}", n.path, e);
                    return;
                }
            }
        } else {
            let mut line = EventLine::new(&mut *out);
            match n.kind {
                ChangeKind::Changed => line.changed(&n.path),
                ChangeKind::Created => line.created(&n.path),
                ChangeKind::Deleted => line.deleted(&n.path),
                ChangeKind::Renamed => line.renamed(&n.path, n.old_path.as_deref()),
            }
        };
        if let Err(e) = written {
            debug!("listen"; "failed to write notification: {}", e);
        }
    })
}
