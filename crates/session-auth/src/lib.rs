//! Session credentials and token refresh
//!
//! Holds the access/refresh credential pair and knows how to exchange a
//! refresh token for a new pair. This crate has no knowledge of the request
//! pipeline; the coordinator and pipeline crates build on top of it.
//!
//! Credential flow:
//! 1. Login (outside this workspace) writes the pair via `CredentialStore::set()`
//! 2. Every outbound request reads the pair via `CredentialStore::get()`
//! 3. On 401 the coordinator calls `RefreshInvoker::refresh()` exactly once
//! 4. The new pair replaces the old one via `CredentialStore::set()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore};
pub use error::{Error, Result};
pub use token::{HttpRefreshInvoker, RefreshInvoker, TokenResponse};
