//! Engine and API client configuration.

use serde::{Deserialize, Serialize};
use std::env;

use crate::types::NameMatch;

/// Default content-graph API base URL.
#[cfg(debug_assertions)]
const DEFAULT_API_URL: &str = "http://localhost:8787/api";

#[cfg(not(debug_assertions))]
const DEFAULT_API_URL: &str = "https://content.api.campuspack.net/api";

/// Configuration for import batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    /// Total stage+register attempts per file (default: 3)
    #[serde(default = "default_max_upload_attempts")]
    pub max_upload_attempts: u32,
    /// Pause between failed attempts in milliseconds (default: 0)
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// How dropped file names are compared against existing ones (`exact` or `case_insensitive`)
    #[serde(default)]
    pub file_name_cmp: NameMatch,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_attempts: default_max_upload_attempts(),
            retry_delay_ms: 0,
            file_name_cmp: NameMatch::Exact,
        }
    }
}

impl ImportConfig {
    /// Applies `DROPBOX_MAX_UPLOAD_ATTEMPTS` over the given config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(attempts) = env::var("DROPBOX_MAX_UPLOAD_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
        {
            self.max_upload_attempts = attempts;
        }
        self
    }
}

fn default_max_upload_attempts() -> u32 {
    3
}

/// Page size used when loading the directory list.
pub const DEFAULT_DIRECTORY_PAGE_SIZE: usize = 500;

/// Configuration for the HTTP asset store.
/// Priority: environment variables > explicit settings > defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL of the content-graph API, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Directories requested per page by `load_directories`
    pub directory_page_size: usize,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_settings_and_env(None, None)
    }

    pub fn from_settings_and_env(setting_url: Option<String>, setting_timeout: Option<u64>) -> Self {
        let base_url = env::var("DROPBOX_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or(setting_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs = env::var("DROPBOX_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(setting_timeout)
            .unwrap_or(30);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            directory_page_size: DEFAULT_DIRECTORY_PAGE_SIZE,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
