/// Async-safe signal handling
/// SIGINT, SIGTERM and SIGHUP only flip atomics here; the executor polls the
/// shutdown flag while waiting and tears the running command down itself.
/// Handlers are installed without SA_RESTART so a blocking read returns EINTR
/// and the caller gets to look at the flag.
use log::debug;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Global shutdown flag (async-safe atomic)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Last signal received, 0 if none
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

/// Signal handler state
pub struct SignalHandler;

impl SignalHandler {
    /// Install handlers for SIGINT, SIGTERM, SIGHUP.
    /// Must be called before any command is spawned.
    pub fn init() -> Result<Self, String> {
        let sig_action = SigAction::new(
            SigHandler::Handler(Self::signal_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            // SAFETY: the handler only performs atomic stores.
            unsafe {
                signal::sigaction(sig, &sig_action)
                    .map_err(|e| format!("Failed to install {} handler: {}", sig.as_str(), e))?;
            }
        }

        debug!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
        Ok(Self)
    }

    /// No allocations, no locks, no I/O
    extern "C" fn signal_handler(signal: libc::c_int) {
        SIGNAL_RECEIVED.store(signal, Ordering::SeqCst);
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }

    /// Flag handed to the executor for cancellation polling
    pub fn shutdown_flag(&self) -> &'static AtomicBool {
        &SHUTDOWN_REQUESTED
    }

    /// Checked between blocking reads, which return EINTR on delivery
    pub fn shutdown_requested(&self) -> bool {
        SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }

    /// Signal that requested shutdown, if any
    pub fn received_signal(&self) -> Option<Signal> {
        match SIGNAL_RECEIVED.load(Ordering::SeqCst) {
            0 => None,
            raw => Signal::try_from(raw).ok(),
        }
    }

    /// Conventional shell exit status for death by the received signal
    pub fn exit_status(&self) -> Option<i32> {
        self.received_signal().map(|sig| 128 + sig as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_handler_init() {
        assert!(SignalHandler::init().is_ok());
    }

    #[test]
    fn test_handler_sets_flag_and_signal() {
        let handler = SignalHandler::init().unwrap();

        SignalHandler::signal_handler(libc::SIGTERM);
        assert!(handler.shutdown_requested());
        assert!(handler.shutdown_flag().load(Ordering::SeqCst));
        assert_eq!(handler.received_signal(), Some(Signal::SIGTERM));
        assert_eq!(handler.exit_status(), Some(143));

        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
        SIGNAL_RECEIVED.store(0, Ordering::SeqCst);
        assert_eq!(handler.received_signal(), None);
    }
}
