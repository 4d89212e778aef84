//! Interrupt handling for long-running scans
//!
//! On the first SIGINT/SIGTERM the shared [`CancelToken`] is tripped. The
//! directory walk and the hashing workers poll it and abandon the scan
//! before the document is touched. A second signal exits immediately.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for interrupted commands (128 + SIGINT).
pub const EXIT_CODE_CANCELLED: i32 = 130;

/// Cooperative cancellation flag shared between the signal handler and
/// scan workers. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: trip the token and let the scan unwind
    Cancel,
    /// Second signal: exit without waiting
    ImmediateExit,
    /// Third+ signal
    Ignore,
}

/// Counts signals and owns the token they trip.
#[derive(Debug, Default)]
pub struct SignalState {
    token: CancelToken,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    pub fn handle_signal(&self) -> SignalAction {
        match self.signal_count.fetch_add(1, Ordering::SeqCst) {
            0 => {
                self.token.cancel();
                SignalAction::Cancel
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Installs the process-wide handler.
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.state.token()
    }

    /// Install the handler. Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::Cancel => {
                tracing::warn!("Received interrupt, abandoning current operation");
            }
            SignalAction::ImmediateExit => {
                tracing::warn!("Received second interrupt, exiting immediately");
                std::process::exit(EXIT_CODE_CANCELLED);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancelToken::new();
        let worker_view = token.clone();
        assert!(!worker_view.is_cancelled());
        token.cancel();
        assert!(worker_view.is_cancelled());
    }

    #[test]
    fn test_first_signal_trips_token() {
        let state = SignalState::new();
        let token = state.token();

        assert_eq!(state.handle_signal(), SignalAction::Cancel);
        assert!(token.is_cancelled());
        assert_eq!(state.signal_count(), 1);
    }

    #[test]
    fn test_second_and_third_signals() {
        let state = SignalState::new();
        state.handle_signal();
        assert_eq!(state.handle_signal(), SignalAction::ImmediateExit);
        assert_eq!(state.handle_signal(), SignalAction::Ignore);
        assert_eq!(state.signal_count(), 3);
    }
}
