//! Error taxonomy surfaced to pipeline callers
//!
//! A 401 never reaches the caller as its own kind: it is either recovered by
//! refresh-and-replay or escalated to `SessionExpired`.

use thiserror::Error;

/// Classified failure of one logical request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No refresh credential, the refresh failed, or the refreshed token was
    /// rejected too. The user has been redirected to login.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Network or timeout failure below HTTP, after transport retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx, non-401 response from the API.
    #[error("request failed with status {status}: {message}")]
    Application { status: u16, message: String },

    /// The request could not be built (bad URL, unencodable header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SessionExpired(_) => "session_expired",
            Error::Transport(_) => "transport_error",
            Error::Application { .. } => "application_error",
            Error::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<session_refresh::Error> for Error {
    fn from(err: session_refresh::Error) -> Self {
        match err {
            session_refresh::Error::SessionExpired(reason) => Error::SessionExpired(reason),
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(Error::SessionExpired("x".into()).kind(), "session_expired");
        assert_eq!(Error::Transport("x".into()).kind(), "transport_error");
        assert_eq!(
            Error::Application {
                status: 500,
                message: "x".into()
            }
            .kind(),
            "application_error"
        );
    }

    #[test]
    fn refresh_failure_maps_to_session_expired() {
        let err: Error = session_refresh::Error::SessionExpired("revoked".into()).into();
        assert_eq!(err, Error::SessionExpired("revoked".into()));
    }

    #[test]
    fn application_error_display_includes_status_and_message() {
        let err = Error::Application {
            status: 404,
            message: "user not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 404: user not found"
        );
    }
}
