use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the GitLab-side internal API.
    #[serde(default = "default_gitlab_url")]
    pub gitlab_url: String,
    /// Shared secret for the internal API; sent base64-encoded on every
    /// request.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log destination; stderr when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_gitlab_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gitlab_url: default_gitlab_url(),
            secret: String::new(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load config from file, or fall back to defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Config::default())
        }
    }

    /// Fixed header set for internal API requests.
    pub fn internal_api_headers(&self, correlation_id: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if !self.secret.is_empty() {
            headers.insert(
                "Gitlab-Shared-Secret".to_string(),
                BASE64.encode(&self.secret),
            );
        }
        headers.insert("X-Request-Id".to_string(), correlation_id.to_string());
        headers
    }
}

/// Config file path: $GITGATE_CONFIG, or config.toml in the working
/// directory.
pub fn config_path() -> PathBuf {
    std::env::var_os("GITGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
