use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Knobs for the sync orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound on in-flight store writes / provider writes within one call.
    pub max_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub signing_secret: Option<String>,
    pub timeout: Duration,
}

/// Process-level configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite file backing the unified store.
    pub database_path: PathBuf,
    pub sync: SyncConfig,
    /// Outbound webhook target. When `None`, events stay on the in-process bus.
    pub webhook: Option<WebhookConfig>,
    pub provider_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/unified.db"),
            sync: SyncConfig::default(),
            webhook: None,
            provider_timeout: Duration::from_secs(20),
        }
    }
}

impl EngineConfig {
    #[tracing::instrument(level = "debug")]
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("UNIFIED_DATABASE_PATH") {
            if !v.trim().is_empty() {
                cfg.database_path = PathBuf::from(v);
            }
        }

        if let Ok(v) = std::env::var("UNIFIED_SYNC_MAX_CONCURRENCY") {
            cfg.sync.max_concurrency = v.trim().parse::<usize>().map_err(|_| {
                Error::InvalidInput(format!("invalid UNIFIED_SYNC_MAX_CONCURRENCY: {v}"))
            })?;
        }

        let provider_timeout_ms = std::env::var("UNIFIED_PROVIDER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(20_000);
        cfg.provider_timeout = Duration::from_millis(provider_timeout_ms);

        if let Some(url) = std::env::var("UNIFIED_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            let timeout_ms = std::env::var("UNIFIED_WEBHOOK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000);
            cfg.webhook = Some(WebhookConfig {
                url,
                signing_secret: std::env::var("UNIFIED_WEBHOOK_SIGNING_SECRET")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
                timeout: Duration::from_millis(timeout_ms),
            });
        }

        cfg.validate()?;
        Ok(cfg)
    }

    #[tracing::instrument(level = "debug")]
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::InvalidInput("database_path is empty".to_string()));
        }
        if self.sync.max_concurrency == 0 {
            return Err(Error::InvalidInput(
                "sync max_concurrency must be > 0".to_string(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "provider_timeout must be > 0".to_string(),
            ));
        }
        if let Some(webhook) = &self.webhook {
            if !(webhook.url.starts_with("http://") || webhook.url.starts_with("https://")) {
                return Err(Error::InvalidInput(format!(
                    "webhook url must be http(s): {}",
                    webhook.url
                )));
            }
            if webhook.timeout.is_zero() {
                return Err(Error::InvalidInput("webhook timeout must be > 0".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cfg = EngineConfig {
            sync: SyncConfig { max_concurrency: 0 },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn webhook_url_must_be_http() {
        let cfg = EngineConfig {
            webhook: Some(WebhookConfig {
                url: "ftp://example.com/hook".to_string(),
                signing_secret: None,
                timeout: Duration::from_secs(1),
            }),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
