//! Session Request
//!
//! Single-shot API client that:
//! 1. Loads client config and the persisted credential pair
//! 2. Sends one request with the bearer credential and locale attached
//! 3. Refreshes the credential on 401 and replays the request
//! 4. Prints the response body to stdout
//!
//! Usage: `session-request [--config PATH] [--metrics] METHOD PATH [JSON_BODY]`

mod collaborators;
mod config;
mod metrics;

use anyhow::{Context, Result, bail};
use reqwest::Method;
use session_auth::{CredentialStore, HttpRefreshInvoker};
use session_pipeline::{
    Hooks, Pipeline, PipelineConfig, RequestDescriptor, RequestOptions, StaticLocale,
};
use session_refresh::RefreshCoordinator;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::collaborators::{CliNavigator, LogNotifier, LogProgress};
use crate::config::Config;

/// Parsed command line
#[derive(Debug)]
struct Args {
    config: Option<String>,
    metrics: bool,
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Self> {
        let mut config = None;
        let mut metrics = false;
        let mut positional = Vec::new();

        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    let path = iter.next().context("--config requires a path")?;
                    config = Some(path.clone());
                }
                "--metrics" => metrics = true,
                flag if flag.starts_with("--") => bail!("unknown flag: {flag}"),
                _ => positional.push(arg.as_str()),
            }
        }

        let (method, path, body) = match positional.as_slice() {
            [method, path] => (method, path, None),
            [method, path, body] => (method, path, Some(body)),
            _ => bail!("usage: session-request [--config PATH] [--metrics] METHOD PATH [JSON_BODY]"),
        };

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method: {method}"))?;
        let body = body
            .map(|b| serde_json::from_str(b).context("request body must be valid JSON"))
            .transpose()?;

        Ok(Self {
            config,
            metrics,
            method,
            path: path.to_string(),
            body,
        })
    }

    fn request(&self) -> Result<RequestDescriptor> {
        let request = RequestDescriptor::new(self.method.clone(), self.path.clone());
        match &self.body {
            Some(body) => Ok(request.json(body)?),
            None => Ok(request),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the response body
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&raw)?;

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.client.base_url,
        timeout_ms = config.client.timeout_ms,
        retry_limit = config.client.retry_limit,
        credentials = %config.credentials.path.display(),
        "configuration loaded"
    );

    let store = Arc::new(
        CredentialStore::load(config.credentials.path.clone())
            .await
            .with_context(|| {
                format!(
                    "failed to load credentials from {}",
                    config.credentials.path.display()
                )
            })?,
    );

    let request = args.request()?;
    let at_login = config
        .client
        .allow_list
        .iter()
        .any(|entry| request.targets(entry));

    let pipeline_config = PipelineConfig {
        base_url: config.client.base_url.clone(),
        timeout: config.client.timeout(),
        retry_limit: config.client.retry_limit,
        allow_list: config.client.allow_list.clone(),
        refresh_path: config.client.refresh_path.clone(),
    };
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let invoker = Arc::new(HttpRefreshInvoker::new(
        client.clone(),
        pipeline_config.refresh_url(),
        config.client.refresh_timeout(),
    ));
    let navigator = Arc::new(CliNavigator::new(at_login));
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        invoker,
        navigator.clone(),
        config.client.refresh_timeout(),
    ));
    let hooks = Hooks {
        locale: Arc::new(StaticLocale(config.client.locale.clone())),
        progress: Arc::new(LogProgress),
        notifier: Arc::new(LogNotifier),
    };
    let pipeline = Pipeline::new(pipeline_config, client, coordinator, hooks);

    let result = pipeline.send(request, RequestOptions::default()).await;

    if navigator.expired() {
        store
            .clear()
            .await
            .context("failed to clear stored credentials")?;
        warn!(path = %config.credentials.path.display(), "stored credentials cleared");
    }

    if args.metrics {
        eprintln!("{}", prometheus_handle.render());
    }

    let response = result.context("request failed")?;
    println!("{}", response.text());
    if !response.is_success() {
        bail!("server answered {}", response.status);
    }
    Ok(())
}
