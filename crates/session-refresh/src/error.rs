//! Error types for refresh coordination

/// Outcome delivered to the leader and every waiter when a refresh fails.
///
/// `Clone` because one failure fans out to the whole waiter queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("session expired: {0}")]
    SessionExpired(String),
}

/// Result alias for refresh operations.
pub type Result<T> = std::result::Result<T, Error>;
