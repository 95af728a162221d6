//! Redirect-to-login seam
//!
//! The coordinator never renders anything. When a session cannot be
//! recovered it asks the navigator to send the user to the unauthenticated
//! entry point (the login screen). Implementations must not block.

/// Navigation side effects triggered by an unrecoverable session.
pub trait Navigator: Send + Sync {
    /// Whether the application is already showing the unauthenticated entry point.
    fn at_unauthenticated_entry(&self) -> bool;

    /// Navigate to the unauthenticated entry point.
    fn go_unauthenticated(&self);
}
