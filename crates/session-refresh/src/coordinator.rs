//! Refresh state machine and waiter queue
//!
//! One `RefreshCoordinator` exists per process and is shared by reference
//! with the request pipeline. It owns the refresh state and the ordered
//! waiter queue; nothing else mutates them.
//!
//! The state lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Checking `Idle` and switching to `InFlight` happens under one
//! lock acquisition, so two callers can never both become leader. The lock
//! is synchronous so the cleanup guard can run from `Drop`.
//!
//! Transitions:
//! - Idle → InFlight (first 401 observed, caller becomes leader)
//! - InFlight → InFlight (another 401 observed, caller enrolls as waiter)
//! - InFlight → Idle (leader settles, cancelled or not; waiters drained)

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::Secret;
use session_auth::{CredentialStore, RefreshInvoker};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::navigator::Navigator;

/// Observable refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    InFlight,
}

/// Continuation handle for a caller waiting on someone else's refresh.
type Waiter = oneshot::Sender<Result<Secret<String>>>;

/// Waiters only exist inside `InFlight`, so the queue is empty whenever no
/// refresh is running.
enum Cycle {
    Idle,
    InFlight { waiters: Vec<Waiter> },
}

/// Role a caller takes when it asks for a refreshed token.
enum Enrollment {
    Leader,
    Waiter(oneshot::Receiver<Result<Secret<String>>>),
}

/// Ensures at most one refresh call is outstanding and broadcasts its result.
pub struct RefreshCoordinator {
    cycle: Mutex<Cycle>,
    store: Arc<CredentialStore>,
    invoker: Arc<dyn RefreshInvoker>,
    navigator: Arc<dyn Navigator>,
    refresh_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        invoker: Arc<dyn RefreshInvoker>,
        navigator: Arc<dyn Navigator>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            cycle: Mutex::new(Cycle::Idle),
            store,
            invoker,
            navigator,
            refresh_timeout,
        }
    }

    /// Current refresh state.
    pub fn state(&self) -> RefreshState {
        match *self.lock_cycle() {
            Cycle::Idle => RefreshState::Idle,
            Cycle::InFlight { .. } => RefreshState::InFlight,
        }
    }

    /// Number of callers currently waiting on the in-flight refresh.
    pub fn waiting(&self) -> usize {
        match &*self.lock_cycle() {
            Cycle::Idle => 0,
            Cycle::InFlight { waiters } => waiters.len(),
        }
    }

    /// The credential store this coordinator writes refreshed pairs into.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// The navigator used for unrecoverable sessions.
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Obtain a fresh access token, refreshing at most once system-wide.
    ///
    /// If no refresh is running, the caller becomes the leader and performs
    /// the exchange with `refresh_token`. Otherwise the caller waits for the
    /// running refresh and receives its outcome; `refresh_token` is unused.
    ///
    /// Every caller of one cycle sees the same outcome: the new access token
    /// or `SessionExpired`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Secret<String>> {
        match self.enroll() {
            Enrollment::Leader => self.lead(refresh_token).await,
            Enrollment::Waiter(rx) => rx.await.unwrap_or_else(|_| {
                Err(Error::SessionExpired("refresh abandoned".into()))
            }),
        }
    }

    /// Reject every queued waiter and send the user to the login entry point.
    ///
    /// Used when the session is known to be unrecoverable outside of a
    /// refresh failure (e.g. the refresh endpoint itself answered 401). A
    /// refresh that is still running keeps its `InFlight` state and settles
    /// normally; only the waiters enrolled so far are released.
    pub fn expire_session(&self, reason: &str) {
        let waiters = match &mut *self.lock_cycle() {
            Cycle::Idle => Vec::new(),
            Cycle::InFlight { waiters } => std::mem::take(waiters),
        };
        let rejected = broadcast(waiters, Err(Error::SessionExpired(reason.to_owned())));
        warn!(reason, rejected, "session expired, redirecting to login");
        self.navigator.go_unauthenticated();
    }

    fn enroll(&self) -> Enrollment {
        let mut cycle = self.lock_cycle();
        if let Cycle::InFlight { waiters } = &mut *cycle {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            debug!(waiters = waiters.len(), "refresh in flight, enrolled waiter");
            metrics::counter!("session_refresh_waiters_total").increment(1);
            return Enrollment::Waiter(rx);
        }
        *cycle = Cycle::InFlight {
            waiters: Vec::new(),
        };
        Enrollment::Leader
    }

    async fn lead(&self, refresh_token: &str) -> Result<Secret<String>> {
        let guard = CycleGuard {
            coordinator: self,
            settled: false,
        };
        info!("access token rejected, refreshing");

        let outcome = match tokio::time::timeout(
            self.refresh_timeout,
            self.invoker.refresh(refresh_token),
        )
        .await
        {
            Ok(Ok(pair)) => Ok(pair),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "refresh timed out after {}ms",
                self.refresh_timeout.as_millis()
            )),
        };

        match outcome {
            Ok(pair) => {
                let access_token = pair.access_token.clone();
                if let Err(e) = self.store.set(pair).await {
                    warn!(error = %e, "failed to persist refreshed credentials");
                }
                let notified = guard.settle(Ok(access_token.clone()));
                metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
                info!(waiters = notified, "token refresh succeeded");
                Ok(access_token)
            }
            Err(reason) => {
                let err = Error::SessionExpired(reason);
                let notified = guard.settle(Err(err.clone()));
                metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %err, waiters = notified, "token refresh failed, redirecting to login");
                self.navigator.go_unauthenticated();
                Err(err)
            }
        }
    }

    /// Return to `Idle` and hand `outcome` to every waiter in enrollment order.
    ///
    /// The queue is detached under the lock before anyone is notified, so a
    /// caller arriving mid-broadcast starts a new cycle instead of joining a
    /// queue that is being drained.
    fn finish(&self, outcome: Result<Secret<String>>) -> usize {
        let waiters = match std::mem::replace(&mut *self.lock_cycle(), Cycle::Idle) {
            Cycle::Idle => Vec::new(),
            Cycle::InFlight { waiters } => waiters,
        };
        broadcast(waiters, outcome)
    }

    fn lock_cycle(&self) -> MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deliver `outcome` to each waiter in order. Returns how many were notified.
fn broadcast(waiters: Vec<Waiter>, outcome: Result<Secret<String>>) -> usize {
    let count = waiters.len();
    for waiter in waiters {
        // A dropped receiver means that caller was cancelled; nothing to do.
        let _ = waiter.send(outcome.clone());
    }
    count
}

/// Resets the coordinator even if the leader's future is dropped mid-refresh.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, outcome: Result<Secret<String>>) -> usize {
        self.settled = true;
        self.coordinator.finish(outcome)
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let rejected = self
                .coordinator
                .finish(Err(Error::SessionExpired("refresh abandoned".into())));
            warn!(rejected, "refresh leader cancelled, waiters rejected");
        }
    }
}
