//! Header names and default endpoint paths shared by the session crates

/// Header carrying the user's current locale on every request
pub const LANG_HEADER: &str = "accept-language";

/// Scheme prefix for the authorization header value
pub const BEARER_PREFIX: &str = "Bearer ";

/// Login endpoint; the default allow-list entry (no credential attached)
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Endpoint that exchanges a refresh token for a new credential pair
pub const DEFAULT_REFRESH_PATH: &str = "/refresh-token";

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of transport-level retries
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Format an access token as an authorization header value.
pub fn bearer(access_token: &str) -> String {
    format!("{BEARER_PREFIX}{access_token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefixes_token() {
        assert_eq!(bearer("T2"), "Bearer T2");
    }
}
