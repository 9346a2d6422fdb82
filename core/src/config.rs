//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::{CHECK_EMAIL_PATH, LOGIN_PATH, REGISTER_PATH};
use crate::error::ApiError;

/// Settings shared by the adapter, the transport and the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST API (e.g. "http://localhost:3000").
    pub base_url: String,
    /// Routes that must never carry an `Authorization` header.
    pub unauthenticated_paths: Vec<String>,
    /// Per-request timeout applied by `ReqwestTransport`.
    pub request_timeout: Duration,
    /// Directory for `FileStorage`. `None` means in-memory storage.
    pub storage_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            unauthenticated_paths: vec![
                LOGIN_PATH.to_string(),
                REGISTER_PATH.to_string(),
                CHECK_EMAIL_PATH.to_string(),
            ],
            request_timeout: Duration::from_secs(30),
            storage_dir: None,
        }
    }

    /// Read `PETDIARY_API_URL`, `PETDIARY_TIMEOUT_SECS` and
    /// `PETDIARY_STORAGE_DIR`, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ApiError> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("PETDIARY_API_URL")
            .map_err(|_| ApiError::Config("PETDIARY_API_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Ok(raw) = std::env::var("PETDIARY_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| ApiError::Config(format!("PETDIARY_TIMEOUT_SECS={raw:?} is not a number")))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.storage_dir = std::env::var("PETDIARY_STORAGE_DIR").ok().map(PathBuf::from);
        config.validate()?;
        Ok(config)
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "base URL {:?} must start with http:// or https://",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ApiError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Whether requests to `path` go out without a bearer token.
    pub fn is_unauthenticated(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
        self.unauthenticated_paths
            .iter()
            .any(|p| p.trim_end_matches('/') == path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_covers_account_endpoints() {
        let config = ClientConfig::default();
        assert!(config.is_unauthenticated("/users/login"));
        assert!(config.is_unauthenticated("/users/register"));
        assert!(config.is_unauthenticated("/users/check-email"));
        assert!(config.is_unauthenticated("/users/check-email?email=a"));
        assert!(!config.is_unauthenticated("/users/profile"));
        assert!(!config.is_unauthenticated("/users/login/extra"));
    }

    #[test]
    fn validate_rejects_bad_urls_and_zero_timeout() {
        assert!(ClientConfig::new("ftp://x").validate().is_err());
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());
        config.request_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
    }
}
