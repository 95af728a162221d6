//! Re-issuing a request after a successful refresh
//!
//! The replay goes straight to the transport, not through the pipeline, so
//! one logical call signals the progress indicator only once.

use common::Secret;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use session_auth::bearer;
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::{ApiResponse, RequestDescriptor, RequestOptions};
use crate::transport::Transport;

/// Re-send a clone of `request` carrying `access_token`.
///
/// Only the authorization header changes; method, path, body and every other
/// header are preserved.
pub async fn replay(
    transport: &Transport,
    request: &RequestDescriptor,
    options: &RequestOptions,
    access_token: &Secret<String>,
) -> Result<ApiResponse> {
    let mut replayed = request.clone();
    set_authorization(&mut replayed.headers, access_token)?;
    debug!(path = %replayed.path, "replaying request with refreshed credential");
    transport.send(&replayed, options).await
}

/// Insert `Authorization: Bearer <token>`, marked sensitive.
pub(crate) fn set_authorization(headers: &mut HeaderMap, access_token: &Secret<String>) -> Result<()> {
    let mut value = HeaderValue::from_str(&bearer(access_token.expose()))
        .map_err(|e| Error::InvalidRequest(format!("access token is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}
