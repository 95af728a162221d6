//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are never read from the TOML; they live in the credentials file.

use serde::Deserialize;
use session_auth::{DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, DEFAULT_RETRY_LIMIT, DEFAULT_TIMEOUT_MS};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// API client settings
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Path suffixes sent without the access credential
    #[serde(default = "default_allow_list")]
    pub allow_list: Vec<String>,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Falls back to `timeout_ms` when unset
    #[serde(default)]
    pub refresh_timeout_ms: Option<u64>,
}

/// Where the credential pair is persisted
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

fn default_locale() -> String {
    "en-US".into()
}

fn default_allow_list() -> Vec<String> {
    vec![DEFAULT_LOGIN_PATH.to_string()]
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms.unwrap_or(self.timeout_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// `API_BASE_URL` replaces `client.base_url`, `API_TIMEOUT` (milliseconds)
    /// replaces `client.timeout_ms`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.client.base_url = url;
        }
        if let Ok(timeout) = std::env::var("API_TIMEOUT") {
            config.client.timeout_ms = timeout.trim().parse().map_err(|e| {
                common::Error::Config(format!("API_TIMEOUT must be milliseconds, got {timeout:?}: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.client.base_url.starts_with("http://")
            && !self.client.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.client.base_url
            )));
        }

        if self.client.timeout_ms == 0 {
            return Err(common::Error::Config(
                "timeout_ms must be greater than 0".into(),
            ));
        }

        if self.client.refresh_timeout_ms == Some(0) {
            return Err(common::Error::Config(
                "refresh_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-request.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that read or mutate process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_overrides() {
        unsafe {
            remove_env("API_BASE_URL");
            remove_env("API_TIMEOUT");
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("session-request.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[client]
base_url = "https://api.example.com/"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load(&write_config(&dir, MINIMAL)).unwrap();

        assert_eq!(config.client.base_url, "https://api.example.com/");
        assert_eq!(config.client.timeout(), Duration::from_secs(10));
        assert_eq!(config.client.refresh_timeout(), Duration::from_secs(10));
        assert_eq!(config.client.retry_limit, 3);
        assert_eq!(config.client.locale, "en-US");
        assert_eq!(config.client.allow_list, vec!["/login"]);
        assert_eq!(config.client.refresh_path, "/refresh-token");
        assert_eq!(config.credentials.path, PathBuf::from("credentials.json"));
    }

    #[test]
    fn full_config_is_read() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[client]
base_url = "http://localhost:8080/api"
timeout_ms = 2500
retry_limit = 0
locale = "ko-KR"
allow_list = ["/login", "/signup"]
refresh_path = "/auth/refresh"
refresh_timeout_ms = 5000

[credentials]
path = "/var/lib/session/credentials.json"
"#,
        );

        let config = Config::load(&path).unwrap();

        assert_eq!(config.client.timeout(), Duration::from_millis(2500));
        assert_eq!(config.client.refresh_timeout(), Duration::from_secs(5));
        assert_eq!(config.client.retry_limit, 0);
        assert_eq!(config.client.locale, "ko-KR");
        assert_eq!(config.client.allow_list.len(), 2);
        assert_eq!(config.client.refresh_path, "/auth/refresh");
        assert_eq!(
            config.credentials.path,
            PathBuf::from("/var/lib/session/credentials.json")
        );
    }

    #[test]
    fn env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);

        unsafe {
            set_env("API_BASE_URL", "http://127.0.0.1:9000");
            set_env("API_TIMEOUT", "750");
        }
        let config = Config::load(&path);
        clear_overrides();

        let config = config.unwrap();
        assert_eq!(config.client.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.client.timeout_ms, 750);
    }

    #[test]
    fn non_numeric_timeout_override_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);

        unsafe { set_env("API_TIMEOUT", "ten seconds") };
        let result = Config::load(&path);
        clear_overrides();

        let err = result.unwrap_err().to_string();
        assert!(err.contains("API_TIMEOUT"), "got: {err}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Path::new("/nonexistent/session-request.toml")).is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn base_url_without_scheme_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[client]\nbase_url = \"api.example.com\"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(
            &dir,
            "[client]\nbase_url = \"https://api.example.com\"\ntimeout_ms = 0\n",
        );
        assert!(Config::load(&path).is_err(), "timeout_ms = 0 must be rejected");

        let path = write_config(
            &dir,
            "[client]\nbase_url = \"https://api.example.com\"\nrefresh_timeout_ms = 0\n",
        );
        assert!(
            Config::load(&path).is_err(),
            "refresh_timeout_ms = 0 must be rejected"
        );
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let cli = Config::resolve_path(Some("/cli/wins.toml"));
        let env = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };

        assert_eq!(cli, PathBuf::from("/cli/wins.toml"));
        assert_eq!(env, PathBuf::from("/env/should-lose.toml"));
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("session-request.toml")
        );
    }
}
