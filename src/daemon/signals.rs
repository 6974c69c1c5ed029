//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGUSR1 immediate pass.
//!
//! Uses the `signal-hook` crate for safe registration. The `run` command's
//! foreground loop polls these flags; it maps shutdown to `stop()` on the
//! manager and an immediate-pass request to `run_pass_now()`.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the OS handler and the foreground
/// loop. Flags use `Ordering::Relaxed`; they are polled, never fenced against
/// other state.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    pass_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS hooks: SIGTERM/SIGINT -> shutdown,
    /// SIGUSR1 -> immediate pass. Registration failures are logged to stderr
    /// but not fatal.
    #[must_use]
    pub fn new() -> Self {
        let handler = Self::detached();
        handler.register_signals();
        handler
    }

    /// A handler with no OS hooks, for tests and embedding.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            pass_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether an immediate pass has been requested.
    pub fn should_run_pass(&self) -> bool {
        self.pass_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_pass(&self) {
        self.pass_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[SFR-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[SFR-SIGNAL] failed to register SIGINT: {e}");
        }
        #[cfg(unix)]
        {
            use signal_hook::consts::SIGUSR1;
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.pass_flag)) {
                eprintln!("[SFR-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── tests ────────────────────
