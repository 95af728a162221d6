//! Request and response values passed through the pipeline
//!
//! Requests are plain data so they can be cloned for replay after a refresh.
//! Responses are fully buffered; the body is read once by the transport and
//! shared cheaply via `Bytes`.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// An outbound API call, relative to the pipeline's base URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the base URL, optionally with a query string
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add or replace a header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("header {name} value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidRequest(format!("serializing JSON body: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Path component without the query string, always starting with `/`.
    pub fn route(&self) -> String {
        let path = self.path.split('?').next().unwrap_or_default();
        format!("/{}", path.trim_start_matches('/'))
    }

    /// Whether the route ends with `suffix` (allow-list / refresh endpoint matching).
    pub fn targets(&self, suffix: &str) -> bool {
        let suffix = format!("/{}", suffix.trim_start_matches('/'));
        self.route().ends_with(&suffix)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Suppress progress-indicator signaling for this request
    pub ignore_loading: bool,
    /// Override the pipeline's default timeout
    pub timeout: Option<Duration>,
    /// Override the pipeline's default transport retry limit
    pub retry_limit: Option<u32>,
    /// Override the pipeline's base URL prefix for this request
    pub base_url: Option<String>,
}

impl RequestOptions {
    pub fn ignore_loading() -> Self {
        Self {
            ignore_loading: true,
            ..Self::default()
        }
    }
}

/// A buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Application {
            status: self.status.as_u16(),
            message: format!("invalid JSON response: {e}"),
        })
    }
}
