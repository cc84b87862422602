//! Configuration
//!
//! Backend endpoint and credentials, stored in
//! `~/.config/xflow/config.toml`.
//!
//! ## Priority order (highest to lowest)
//!
//! 1. Environment variables (`XGEN_API_URL`, `XGEN_API_KEY`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FlowError, Result};

/// Default backend base URL (local dev server)
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    /// Base URL of the xgen backend API
    pub api_url: Option<String>,

    /// Bearer token sent with every request
    pub api_key: Option<String>,
}

impl FlowConfig {
    /// `~/.config/xflow/` on Unix, `%APPDATA%/xflow/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xflow")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the config file, defaulting when absent.
    /// A present-but-malformed file is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| FlowError::config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| FlowError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Save to the config file, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .map_err(|e| FlowError::config(format!("Failed to create config dir: {}", e)))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FlowError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(Self::config_path(), content)
            .map_err(|e| FlowError::config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Merge environment variables over file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("XGEN_API_URL") {
            if !url.is_empty() {
                self.api_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("XGEN_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    /// Effective base URL, validated and with a trailing slash trimmed.
    pub fn base_url(&self) -> Result<String> {
        let raw = self.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let parsed = Url::parse(raw)
            .map_err(|e| FlowError::config(format!("Invalid api_url '{}': {}", raw, e)))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FlowError::config(format!(
                    "Unsupported api_url scheme '{}' (use http or https)",
                    other
                )))
            }
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}
