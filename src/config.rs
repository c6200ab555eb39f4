//! Configuration.
//!
//! Loaded from an optional TOML file with `POSTRUN_*` environment-variable
//! overrides. The webhook endpoint is only registered when a signing secret
//! is configured.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::verification::DEFAULT_TOLERANCE_SECS;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostRunConfig {
    /// Domain API key for the outbound send API.
    pub api_key: Option<String>,

    /// Base URL of the PostRun instance (self-hosted installations override).
    pub endpoint: String,

    /// Address the webhook server binds to.
    pub listen_addr: String,

    /// Inbound webhook settings.
    pub webhook: WebhookConfig,
}

/// Inbound webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    /// Signing secret from the PostRun webhook endpoint settings. The
    /// endpoint is not registered without one.
    pub secret: Option<String>,

    /// Route path for the webhook endpoint.
    pub path: String,

    /// Signature timestamp tolerance in seconds (replay window).
    pub tolerance_secs: i64,
}

impl Default for PostRunConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://postrun.io".to_string(),
            listen_addr: "127.0.0.1:8080".to_string(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            path: "/postrun/webhooks".to_string(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl PostRunConfig {
    /// Load configuration: defaults, then the TOML file if it exists, then
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        // axum asserts on route paths at registration; reject bad paths here
        // with a readable error instead of panicking at startup.
        anyhow::ensure!(
            config.webhook.path.starts_with('/'),
            "webhook path {:?} must start with '/'",
            config.webhook.path
        );
        Ok(config)
    }

    /// Apply `POSTRUN_*` environment variables over the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("POSTRUN_API_KEY") {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("POSTRUN_ENDPOINT") {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var("POSTRUN_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Ok(v) = std::env::var("POSTRUN_WEBHOOK_SECRET") {
            self.webhook.secret = Some(v);
        }
        if let Ok(v) = std::env::var("POSTRUN_WEBHOOK_PATH") {
            self.webhook.path = v;
        }
        if let Ok(v) = std::env::var("POSTRUN_WEBHOOK_TOLERANCE") {
            self.webhook.tolerance_secs = v
                .parse()
                .context("POSTRUN_WEBHOOK_TOLERANCE must be an integer number of seconds")?;
        }
        Ok(())
    }

    /// Whether the webhook endpoint should be registered at all.
    pub fn webhook_enabled(&self) -> bool {
        self.webhook
            .secret
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }
}
