//! Declarative configuration of the error boundary.
//!
//! ```
//! use ssr_boundary::config::ErrorBoundaryConfig;
//!
//! let config = ErrorBoundaryConfig::from_json(r#"{
//!     "entry_point": "errorPage",
//!     "asset_manifest": "dist/stats.json",
//!     "redirect_status": 303
//! }"#).unwrap();
//!
//! assert_eq!(config.entry_point, "errorPage");
//! assert!(!config.cache_asset_manifest);
//! ```

use crate::fallback::DEFAULT_ENTRY_POINT;
use http::StatusCode;
use serde::Deserialize;
use std::{fmt, path::PathBuf};

/// Configuration of an [`ErrorBoundaryHandler`](crate::boundary::ErrorBoundaryHandler).
///
/// Hooks, the fallback component and the diagnostics sink are code,
/// and therefore configured on the handler itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorBoundaryConfig {
    /// Bundler entry point holding the fallback page assets.
    pub entry_point: String,
    /// Path of the json asset manifest, if any.
    pub asset_manifest: Option<PathBuf>,
    /// Read the asset manifest once instead of on every fallback render.
    pub cache_asset_manifest: bool,
    /// Status used for redirects that do not declare one.
    pub redirect_status: u16,
}

impl Default for ErrorBoundaryConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_owned(),
            asset_manifest: None,
            cache_asset_manifest: false,
            redirect_status: crate::classify::DEFAULT_REDIRECT_STATUS.as_u16(),
        }
    }
}

impl ErrorBoundaryConfig {
    /// Parse a configuration from json, missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    /// Validated redirect status.
    pub fn redirect_status(&self) -> Result<StatusCode, ConfigError> {
        StatusCode::from_u16(self.redirect_status)
            .ok()
            .filter(StatusCode::is_redirection)
            .ok_or(ConfigError::RedirectStatus(self.redirect_status))
    }
}

/// Invalid [`ErrorBoundaryConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration is not valid json or has unknown fields.
    Parse(serde_json::Error),
    /// The redirect status is not a 3xx status.
    RedirectStatus(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid error boundary config: {err}"),
            Self::RedirectStatus(status) => {
                write!(f, "invalid redirect status {status}: expected a 3xx status")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::RedirectStatus(_) => None,
        }
    }
}
