//! Signal handling for the slave daemon.
//!
//! SIGTERM and SIGINT stop the poll loop; SIGHUP asks for a status dump.
//! The C handlers only touch atomics; a watcher thread forwards them to
//! the shared [`SignalState`] polled by the main loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signals the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - graceful termination.
    Terminate,
    /// SIGINT - Ctrl+C.
    Interrupt,
    /// SIGHUP - status dump.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Flags shared between the signal watcher and the poll loop.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    status_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if a status dump has been requested (and clear the flag).
    #[inline]
    pub fn take_status_request(&self) -> bool {
        self.status_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request a status dump.
    pub fn request_status(&self) {
        self.status_requested.store(true, Ordering::Relaxed);
    }

    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        debug!(signal = %kind, "Signal recorded");
    }

    /// Total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Handle polled by the daemon's main loop.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a handler and register the process signal handlers.
    ///
    /// On non-Unix platforms only manual shutdown is available.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static TERMINATE_FLAG: AtomicBool = AtomicBool::new(false);
        static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(false);
        static HANGUP_FLAG: AtomicBool = AtomicBool::new(false);

        extern "C" fn on_sigterm(_: c_int) {
            TERMINATE_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn on_sigint(_: c_int) {
            INTERRUPT_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn on_sighup(_: c_int) {
            HANGUP_FLAG.store(true, Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("signal-watch".into())
            .spawn(move || loop {
                for (flag, kind) in [
                    (&TERMINATE_FLAG, SignalKind::Terminate),
                    (&INTERRUPT_FLAG, SignalKind::Interrupt),
                ] {
                    if flag.swap(false, Ordering::Relaxed) {
                        info!(signal = %kind, "Shutdown signal received");
                        state.record_signal(kind);
                        state.request_shutdown();
                    }
                }
                if HANGUP_FLAG.swap(false, Ordering::Relaxed) {
                    state.record_signal(SignalKind::Hangup);
                    state.request_status();
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            })?;

        // SAFETY: the handlers only store to static atomics, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, on_sigterm as libc::sighandler_t);
            libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
            libc::signal(libc::SIGHUP, on_sighup as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if a status dump has been requested (clears the flag).
    #[inline]
    pub fn take_status_request(&self) -> bool {
        self.state.take_status_request()
    }

    /// Manually request shutdown.
    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    /// Shared state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
