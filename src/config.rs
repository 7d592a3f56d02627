//! Configuration Management
//!
//! Handles persistent configuration storage for seqsync. The access token is
//! deliberately absent: it only ever comes from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::compute_env::{ClassifyStrategy, OperationClassifier, PollPolicy, RetryClassification};

/// Built-in API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.cloud.seqera.io";

/// Overrides the configured API endpoint
pub const BASE_URL_ENV: &str = "SEQERA_API_URL";

/// Overrides the configured workspace
pub const WORKSPACE_ENV: &str = "SEQERA_WORKSPACE_ID";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Last used API endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Last used workspace
    #[serde(default)]
    pub workspace_id: Option<String>,
    /// Compute environment polling
    #[serde(default)]
    pub poll: PollSettings,
}

/// Poll policy overrides; unset fields keep the built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PollSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_wait_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_poll_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_network_errors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_throttled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_server_errors: Option<bool>,
    /// How operation ids are matched against create/delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify_strategy: Option<ClassifyStrategy>,
}

impl PollSettings {
    /// Resolve against the built-in policy
    pub fn to_policy(&self) -> PollPolicy {
        let defaults = PollPolicy::default();
        let retry = RetryClassification::default();

        PollPolicy {
            initial_wait: self
                .initial_wait_secs
                .map_or(defaults.initial_wait, Duration::from_secs),
            poll_interval: self
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
            fast_poll_interval: self
                .fast_poll_interval_secs
                .map_or(defaults.fast_poll_interval, Duration::from_secs),
            fast_poll_attempts: self.fast_poll_attempts.unwrap_or(defaults.fast_poll_attempts),
            retry_interval: self
                .retry_interval_ms
                .map_or(defaults.retry_interval, Duration::from_millis),
            request_timeout: self
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            overall_timeout: self
                .overall_timeout_secs
                .map_or(defaults.overall_timeout, Duration::from_secs),
            retry: RetryClassification {
                network_errors: self.retry_network_errors.unwrap_or(retry.network_errors),
                throttled: self.retry_throttled.unwrap_or(retry.throttled),
                server_errors: self.retry_server_errors.unwrap_or(retry.server_errors),
            },
        }
    }

    pub fn classifier(&self) -> OperationClassifier {
        OperationClassifier::compute_envs(self.classify_strategy.unwrap_or_default())
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("seqsync").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path; a missing or unreadable file yields defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparseable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        Ok(())
    }

    /// Get effective API endpoint (CLI > env > config > default)
    pub fn effective_base_url(&self, cli: Option<&str>) -> String {
        pick(cli, env_value(BASE_URL_ENV), self.base_url.as_deref())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Get effective workspace (CLI > env > config); there is no default
    pub fn effective_workspace(&self, cli: Option<&str>) -> Option<String> {
        pick(cli, env_value(WORKSPACE_ENV), self.workspace_id.as_deref())
    }

    /// Remember the endpoint and workspace used by this run
    pub fn remember(&mut self, base_url: &str, workspace_id: Option<&str>) -> bool {
        let before = (self.base_url.clone(), self.workspace_id.clone());
        self.base_url = Some(base_url.to_string());
        if let Some(ws) = workspace_id {
            self.workspace_id = Some(ws.to_string());
        }
        before != (self.base_url.clone(), self.workspace_id.clone())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn pick(cli: Option<&str>, env: Option<String>, file: Option<&str>) -> Option<String> {
    cli.map(str::to_string)
        .or(env)
        .or_else(|| file.map(str::to_string))
}
