//! Collaborators the pipeline calls around each request
//!
//! These are display and preference concerns owned by the host application.
//! All of them are fire-and-forget and must not block or panic.

use std::sync::Arc;

/// Supplies the locale sent with every request.
pub trait LocaleProvider: Send + Sync {
    fn current_locale(&self) -> String;
}

/// Global loading indicator. `start`/`done` are idempotent.
pub trait ProgressIndicator: Send + Sync {
    fn start(&self);
    fn done(&self);
}

/// Surfaces classified application errors to the user.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Locale that never changes.
#[derive(Debug, Clone)]
pub struct StaticLocale(pub String);

impl LocaleProvider for StaticLocale {
    fn current_locale(&self) -> String {
        self.0.clone()
    }
}

/// The host application's collaborators, bundled for `Pipeline::new`.
#[derive(Clone)]
pub struct Hooks {
    pub locale: Arc<dyn LocaleProvider>,
    pub progress: Arc<dyn ProgressIndicator>,
    pub notifier: Arc<dyn Notifier>,
}

/// Signals `done` exactly once when dropped, if `start` was signaled.
///
/// Dropping covers every exit path: normal return, `?` propagation and
/// cancellation of the request future.
pub(crate) struct ProgressGuard {
    indicator: Option<Arc<dyn ProgressIndicator>>,
}

impl ProgressGuard {
    pub(crate) fn start(indicator: &Arc<dyn ProgressIndicator>, ignore_loading: bool) -> Self {
        if ignore_loading {
            return Self { indicator: None };
        }
        indicator.start();
        Self {
            indicator: Some(indicator.clone()),
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        if let Some(indicator) = self.indicator.take() {
            indicator.done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        done: AtomicUsize,
    }

    impl ProgressIndicator for Counter {
        fn start(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn done(&self) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn guard_pairs_start_with_done() {
        let counter = Arc::new(Counter::default());
        let indicator: Arc<dyn ProgressIndicator> = counter.clone();

        let guard = ProgressGuard::start(&indicator, false);
        assert_eq!(counter.started.load(Ordering::SeqCst), 1);
        assert_eq!(counter.done.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(counter.done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ignored_loading_signals_nothing() {
        let counter = Arc::new(Counter::default());
        let indicator: Arc<dyn ProgressIndicator> = counter.clone();

        drop(ProgressGuard::start(&indicator, true));
        assert_eq!(counter.started.load(Ordering::SeqCst), 0);
        assert_eq!(counter.done.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn static_locale_returns_configured_value() {
        assert_eq!(StaticLocale("ko-KR".into()).current_locale(), "ko-KR");
    }
}
