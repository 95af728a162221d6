//! Configuration and persistence errors shared by every crate

use thiserror::Error;

/// Errors raised while loading configuration or persisted state
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_field() {
        let err = Error::Config("base_url must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: base_url must not be empty"
        );
    }

    #[test]
    fn json_errors_convert_via_from() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(
            err.to_string().starts_with("JSON error:"),
            "got: {err}"
        );
        assert!(format!("{err:?}").contains("Json"));
    }
}
