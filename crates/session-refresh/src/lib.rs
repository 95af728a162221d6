//! Single-flight credential refresh
//!
//! When an access token expires, every in-flight request observes a 401 at
//! roughly the same time. The coordinator makes sure exactly one of them
//! calls the refresh endpoint while the rest wait for its outcome.
//!
//! Refresh cycle:
//! 1. First 401 while `Idle` → caller becomes the leader, state `InFlight`
//! 2. Further 401s while `InFlight` → callers enroll as waiters
//! 3. Leader's refresh succeeds → store updated, waiters receive the new token
//! 4. Leader's refresh fails → waiters rejected, navigator sends user to login
//! 5. Either way → state back to `Idle` with an empty waiter queue

pub mod coordinator;
pub mod error;
pub mod navigator;

pub use coordinator::{RefreshCoordinator, RefreshState};
pub use error::{Error, Result};
pub use navigator::Navigator;
