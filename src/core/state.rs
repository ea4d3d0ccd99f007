//! Shutdown state for long-running commands.
//!
//! `SHUTDOWN` is set by the Ctrl+C handler. The `listen` read loop and the
//! `launch` wait loop both poll it, close their resources and return.
//! A second Ctrl+C exits immediately.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Exit status used when a second Ctrl+C forces the process down.
const FORCED_EXIT_CODE: i32 = 130;

/// Setup the global Ctrl+C handler. Call once at program start
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(FORCED_EXIT_CODE);
        }
        crate::log!("serve"; "shutting down...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
///
/// Uses Relaxed ordering: pollers only need to see the flag eventually.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
