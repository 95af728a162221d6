//! Authenticated request pipeline
//!
//! Wraps every outbound API call with a fixed sequence of stages:
//!
//! 1. Pre-send: start progress, attach `Authorization` (unless allow-listed),
//!    attach the locale header
//! 2. Transport: send with bounded retries for transient failures
//! 3. Post-receive: finish progress, then classify the response
//!    - 2xx → returned unchanged
//!    - 401 → single-flight refresh, then replay with the new token
//!    - anything else → error classifier (notification + typed error)
//!
//! Transport retries happen before a response is classified; refresh replays
//! happen after a 401 is classified. The two never feed into each other.

pub mod classify;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod replay;
pub mod request;
pub mod transport;

pub use classify::ErrorClassifier;
pub use error::{Error, Result};
pub use hooks::{Hooks, LocaleProvider, Notifier, ProgressIndicator, StaticLocale};
pub use pipeline::{Pipeline, PipelineConfig};
pub use request::{ApiResponse, RequestDescriptor, RequestOptions};
pub use transport::Transport;
