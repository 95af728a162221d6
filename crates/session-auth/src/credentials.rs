//! Credential pair storage
//!
//! The store is the single source of truth for the access/refresh pair. Every
//! pre-send hook reads it; only a successful refresh (or login/logout) writes
//! it. A tokio Mutex serializes writes so a refresh landing concurrently with
//! a logout cannot interleave a half-written pair.
//!
//! Persistence is optional. When backed by a file, every write goes through
//! an atomic temp-file + rename so a crash never leaves a corrupt pair.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The access credential and the refresh credential used to renew it.
///
/// Both tokens are empty strings when the user is logged out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
        }
    }

    /// Whether a refresh credential is present.
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// Thread-safe holder of the current credential pair.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<CredentialPair>,
}

impl CredentialStore {
    /// Store that lives only in memory.
    pub fn in_memory(pair: CredentialPair) -> Self {
        Self {
            path: None,
            state: Mutex::new(pair),
        }
    }

    /// Load the pair from a JSON file.
    ///
    /// A missing file is a cold start: the store begins logged out and the
    /// file is created so later loads skip this path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let pair = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let pair: CredentialPair = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                logged_in = pair.has_refresh_token(),
                "loaded credentials"
            );
            pair
        } else {
            info!(path = %path.display(), "credential file not found, starting logged out");
            let pair = CredentialPair::default();
            write_atomic(&path, &pair).await?;
            pair
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(pair),
        })
    }

    /// Snapshot of the current pair.
    pub async fn get(&self) -> CredentialPair {
        self.state.lock().await.clone()
    }

    /// Replace the pair.
    ///
    /// The in-memory value is updated before persisting, so readers observe
    /// the new pair even if the disk write fails.
    pub async fn set(&self, pair: CredentialPair) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = pair;
        debug!("credential pair replaced");
        match &self.path {
            Some(path) => write_atomic(path, &state).await,
            None => Ok(()),
        }
    }

    /// Forget both tokens (logout).
    pub async fn clear(&self) -> Result<()> {
        self.set(CredentialPair::default()).await
    }
}

/// Write the pair to a file atomically with 0600 permissions.
async fn write_atomic(path: &Path, pair: &CredentialPair) -> Result<()> {
    let json = serde_json::to_string_pretty(pair)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_get_and_set() {
        let store = CredentialStore::in_memory(CredentialPair::new("T1", "R1"));
        assert_eq!(store.get().await.access_token.expose(), "T1");

        store.set(CredentialPair::new("T2", "R2")).await.unwrap();
        let pair = store.get().await;
        assert_eq!(pair.access_token.expose(), "T2");
        assert_eq!(pair.refresh_token.expose(), "R2");
    }

    #[tokio::test]
    async fn clear_logs_out() {
        let store = CredentialStore::in_memory(CredentialPair::new("T1", "R1"));
        store.clear().await.unwrap();
        let pair = store.get().await;
        assert!(pair.access_token.is_empty());
        assert!(!pair.has_refresh_token());
    }

    #[tokio::test]
    async fn cold_start_creates_logged_out_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        assert!(!store.get().await.has_refresh_token());
        assert!(path.exists());

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["accessToken"], "");
        assert_eq!(json["refreshToken"], "");
    }

    #[tokio::test]
    async fn set_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("at_new", "rt_new")).await.unwrap();

        let reloaded = CredentialStore::load(path).await.unwrap();
        assert_eq!(reloaded.get().await, CredentialPair::new("at_new", "rt_new"));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        tokio::fs::write(&path, "{ nope").await.unwrap();

        let result = CredentialStore::load(path).await;
        assert!(matches!(result, Err(Error::CredentialParse(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set(CredentialPair::new("a", "b")).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let debug = format!("{:?}", CredentialPair::new("at_secret", "rt_secret"));
        assert!(!debug.contains("at_secret"));
        assert!(!debug.contains("rt_secret"));
    }
}
