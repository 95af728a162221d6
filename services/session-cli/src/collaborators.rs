//! Log-backed host collaborators for a headless client
//!
//! There is no UI: progress and notifications become log lines, and
//! "redirect to login" marks the session expired so `main` can clear the
//! stored credentials before exiting.

use session_pipeline::{Notifier, ProgressIndicator};
use session_refresh::Navigator;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Records that the session ended instead of navigating anywhere.
pub struct CliNavigator {
    at_login: bool,
    expired: AtomicBool,
}

impl CliNavigator {
    /// `at_login` is true when the request being issued is itself an
    /// unauthenticated entry point (e.g. the login call).
    pub fn new(at_login: bool) -> Self {
        Self {
            at_login,
            expired: AtomicBool::new(false),
        }
    }

    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }
}

impl Navigator for CliNavigator {
    fn at_unauthenticated_entry(&self) -> bool {
        self.at_login
    }

    fn go_unauthenticated(&self) {
        if !self.expired.swap(true, Ordering::SeqCst) {
            warn!("session expired, log in again to obtain new credentials");
        }
    }
}

pub struct LogProgress;

impl ProgressIndicator for LogProgress {
    fn start(&self) {
        debug!("request started");
    }

    fn done(&self) {
        debug!("request finished");
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        error!(reason = %message, "server reported an error");
    }
}
