//! Refresh-token exchange
//!
//! `RefreshInvoker` is the seam between the coordinator and the network: it
//! takes a refresh token and yields a brand-new credential pair. The HTTP
//! implementation POSTs to the API's refresh endpoint and unwraps the
//! `{ "result": { "token", "refreshToken" } }` envelope.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Token payload inside the refresh endpoint's response envelope.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(response: TokenResponse) -> Self {
        CredentialPair::new(response.token, response.refresh_token)
    }
}

#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    result: TokenResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchanges a refresh credential for a new credential pair.
///
/// Uses `Pin<Box<dyn Future>>` return types so the coordinator can hold an
/// `Arc<dyn RefreshInvoker>`.
pub trait RefreshInvoker: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialPair>> + Send + 'a>>;
}

/// Refresh invoker backed by the API's refresh endpoint.
pub struct HttpRefreshInvoker {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRefreshInvoker {
    /// `endpoint` is the absolute URL of the refresh endpoint.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair> {
        debug!(endpoint = %self.endpoint, "requesting token refresh");
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("after {}ms", self.timeout.as_millis()))
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the refresh token is revoked or expired
            if status.as_u16() == 401 || status.as_u16() == 403 {
                warn!(%status, "refresh endpoint rejected the refresh token");
                return Err(Error::InvalidCredentials(format!("{status}: {body}")));
            }

            return Err(Error::TokenExchange(format!(
                "refresh endpoint returned {status}: {body}"
            )));
        }

        let envelope = response
            .json::<RefreshEnvelope>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

        Ok(envelope.result.into())
    }
}

impl RefreshInvoker for HttpRefreshInvoker {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialPair>> + Send + 'a>> {
        Box::pin(self.exchange(refresh_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn invoker(base: &str) -> HttpRefreshInvoker {
        HttpRefreshInvoker::new(
            reqwest::Client::new(),
            format!("{base}/refresh-token"),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn envelope_deserializes() {
        let json = r#"{"code":200,"message":"ok","result":{"token":"T2","refreshToken":"R2"}}"#;
        let envelope: RefreshEnvelope = serde_json::from_str(json).unwrap();
        let pair: CredentialPair = envelope.result.into();
        assert_eq!(pair, CredentialPair::new("T2", "R2"));
    }

    #[tokio::test]
    async fn refresh_posts_token_and_parses_result() {
        let router = axum::Router::new().route(
            "/refresh-token",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["refreshToken"], "R1");
                Json(serde_json::json!({
                    "code": 200,
                    "result": { "token": "T2", "refreshToken": "R2" }
                }))
            }),
        );
        let base = serve(router).await;

        let pair = invoker(&base).refresh("R1").await.unwrap();
        assert_eq!(pair.access_token.expose(), "T2");
        assert_eq!(pair.refresh_token.expose(), "R2");
    }

    #[tokio::test]
    async fn unauthorized_refresh_is_a_rejection() {
        let router = axum::Router::new().route(
            "/refresh-token",
            post(|| async { (StatusCode::UNAUTHORIZED, "token revoked") }),
        );
        let base = serve(router).await;

        let err = invoker(&base).refresh("R1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err}");
        assert!(err.to_string().contains("token revoked"));
    }

    #[tokio::test]
    async fn server_error_is_a_token_exchange_failure() {
        let router = axum::Router::new().route(
            "/refresh-token",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(router).await;

        let err = invoker(&base).refresh("R1").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got: {err}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_token_exchange_failure() {
        let router = axum::Router::new().route(
            "/refresh-token",
            post(|| async { Json(serde_json::json!({ "result": null })) }),
        );
        let base = serve(router).await;

        let err = invoker(&base).refresh("R1").await.unwrap_err();
        assert!(err.to_string().contains("invalid refresh response"));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let router = axum::Router::new().route(
            "/refresh-token",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::OK
            }),
        );
        let base = serve(router).await;

        let invoker = HttpRefreshInvoker::new(
            reqwest::Client::new(),
            format!("{base}/refresh-token"),
            Duration::from_millis(50),
        );
        let err = invoker.refresh("R1").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "got: {err}");
    }
}
