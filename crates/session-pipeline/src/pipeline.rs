//! Request pipeline: pre-send stages, transport, post-receive classification
//!
//! Stage order is fixed:
//! 1. progress start (unless `ignore_loading`)
//! 2. attach `Authorization: Bearer <access>` (unless the path is allow-listed)
//! 3. attach the locale header (always)
//! 4. transport send (with its own bounded retries)
//! 5. progress done (exactly once, whatever happened above)
//! 6. classify: 2xx → return, 401 → refresh and replay, other → classifier

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::StatusCode;
use reqwest::header::{HeaderName, HeaderValue};
use session_auth::{
    DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, DEFAULT_RETRY_LIMIT, DEFAULT_TIMEOUT_MS,
    LANG_HEADER,
};
use session_refresh::RefreshCoordinator;
use tracing::{debug, instrument};

use crate::classify::ErrorClassifier;
use crate::error::{Error, Result};
use crate::hooks::{Hooks, ProgressGuard};
use crate::replay::{replay, set_authorization};
use crate::request::{ApiResponse, RequestDescriptor, RequestOptions};
use crate::transport::{Transport, join_url};

/// Static settings for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_limit: u32,
    /// Path suffixes that never carry the access credential
    pub allow_list: Vec<String>,
    /// Path suffix of the refresh endpoint; a 401 from it is never refreshed
    pub refresh_path: String,
}

impl PipelineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry_limit: DEFAULT_RETRY_LIMIT,
            allow_list: vec![DEFAULT_LOGIN_PATH.to_string()],
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }

    /// Absolute URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        join_url(&self.base_url, &self.refresh_path)
    }
}

/// Authenticated client for one API.
pub struct Pipeline {
    transport: Transport,
    coordinator: Arc<RefreshCoordinator>,
    hooks: Hooks,
    classifier: ErrorClassifier,
    allow_list: Vec<String>,
    refresh_path: String,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        client: reqwest::Client,
        coordinator: Arc<RefreshCoordinator>,
        hooks: Hooks,
    ) -> Self {
        let transport = Transport::new(
            client,
            config.base_url,
            config.timeout,
            config.retry_limit,
        );
        let classifier = ErrorClassifier::new(hooks.notifier.clone());
        Self {
            transport,
            coordinator,
            hooks,
            classifier,
            allow_list: config.allow_list,
            refresh_path: config.refresh_path,
        }
    }

    /// Override the transport's backoff between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.transport = self.transport.with_retry_delay(delay);
        self
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send one request through every stage.
    ///
    /// A 401 is recovered transparently when possible. The caller only sees
    /// `SessionExpired`, `Transport`, `Application` or `InvalidRequest`.
    #[instrument(
        skip_all,
        fields(
            request_id = %format!("req_{}", uuid::Uuid::new_v4().as_simple()),
            method = %request.method,
            path = %request.path,
        )
    )]
    pub async fn send(
        &self,
        request: RequestDescriptor,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let result = self.dispatch(request, options).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("session_requests_total", "outcome" => outcome).increment(1);
        result
    }

    async fn dispatch(
        &self,
        mut request: RequestDescriptor,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let progress = ProgressGuard::start(&self.hooks.progress, options.ignore_loading);
        let sent_token = self.attach_credential(&mut request).await?;
        self.attach_locale(&mut request)?;
        let received = self.transport.send(&request, &options).await;
        drop(progress);

        let response = received?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status == StatusCode::UNAUTHORIZED {
            return self.recover(&request, &options, sent_token, response).await;
        }
        Err(self.classifier.classify(&response))
    }

    /// Exchange `refresh_token` (single-flight) and replay `request` with the
    /// resulting access token.
    pub async fn handle_unauthorized(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
        refresh_token: &Secret<String>,
    ) -> Result<ApiResponse> {
        let access_token = self.coordinator.refresh(refresh_token.expose()).await?;
        self.replay_and_classify(request, options, &access_token).await
    }

    /// Decide how a 401 is handled before any refresh is attempted.
    async fn recover(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
        sent_token: Option<Secret<String>>,
        response: ApiResponse,
    ) -> Result<ApiResponse> {
        // Refreshing in response to the refresh endpoint would loop forever
        if request.targets(&self.refresh_path) {
            self.coordinator
                .expire_session("refresh endpoint answered 401");
            return Err(Error::SessionExpired("refresh credential rejected".into()));
        }

        let current = self.coordinator.store().get().await;
        if !current.has_refresh_token() {
            if self.coordinator.navigator().at_unauthenticated_entry() {
                debug!("no refresh credential on the login entry point, returning 401");
                return Ok(response);
            }
            self.coordinator.expire_session("no refresh credential");
            return Err(Error::SessionExpired("no refresh credential".into()));
        }

        // Sent before another caller's refresh landed: the store already has a newer token
        if let Some(sent) = sent_token
            && !current.access_token.is_empty()
            && current.access_token != sent
        {
            debug!("credential already refreshed, replaying without a new refresh");
            return self
                .replay_and_classify(request, options, &current.access_token)
                .await;
        }

        self.handle_unauthorized(request, options, &current.refresh_token)
            .await
    }

    /// Replay once and classify the result without re-entering recovery.
    async fn replay_and_classify(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
        access_token: &Secret<String>,
    ) -> Result<ApiResponse> {
        let response = replay(&self.transport, request, options, access_token).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status == StatusCode::UNAUTHORIZED {
            self.coordinator
                .expire_session("refreshed credential rejected");
            return Err(Error::SessionExpired(
                "refreshed credential rejected".into(),
            ));
        }
        Err(self.classifier.classify(&response))
    }

    /// Attach the current access credential unless the path is allow-listed.
    ///
    /// Returns the token that was attached so a later 401 can tell whether
    /// it is already stale.
    async fn attach_credential(
        &self,
        request: &mut RequestDescriptor,
    ) -> Result<Option<Secret<String>>> {
        if self.is_allow_listed(request) {
            return Ok(None);
        }
        let access_token = self.coordinator.store().get().await.access_token;
        set_authorization(&mut request.headers, &access_token)?;
        Ok(Some(access_token))
    }

    fn attach_locale(&self, request: &mut RequestDescriptor) -> Result<()> {
        let locale = self.hooks.locale.current_locale();
        let value = HeaderValue::from_str(&locale)
            .map_err(|e| Error::InvalidRequest(format!("locale {locale:?}: {e}")))?;
        request
            .headers
            .insert(HeaderName::from_static(LANG_HEADER), value);
        Ok(())
    }

    fn is_allow_listed(&self, request: &RequestDescriptor) -> bool {
        self.allow_list.iter().any(|entry| request.targets(entry))
    }
}
