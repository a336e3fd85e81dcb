//! Snapshot publishing to the remote statistics collector
//!
//! The polling task hands the counter snapshot to a [`Publisher`] at most once
//! per cycle. [`StatsReporter`] is the HTTP implementation: it POSTs the
//! snapshot together with the project identification to the collector.

use crate::config::ReporterConfig;
use crate::counters::Snapshot;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Collector used when the configured server does not look like a URL
pub const DEFAULT_STATISTICS_SERVER: &str = "https://statistics.restcomm.com/rest/";
pub const DEFAULT_PROJECT_NAME: &str = "jainslee";
pub const DEFAULT_PROJECT_TYPE: &str = "community";

/// Environment overrides, checked before the config file values
pub const ENV_SERVER: &str = "STATS_SERVER";
pub const ENV_PROJECT_NAME: &str = "STATS_PROJECT_NAME";
pub const ENV_PROJECT_TYPE: &str = "STATS_PROJECT_TYPE";
pub const ENV_PROJECT_VERSION: &str = "STATS_PROJECT_VERSION";

/// Pushes a counter snapshot to a remote collector
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, snapshot: &Snapshot) -> AppResult<()>;
}

/// Resolved reporter identity and destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterSettings {
    pub server: String,
    pub project_name: String,
    pub project_type: String,
    pub version: String,
}

impl ReporterSettings {
    /// Resolve settings from the process environment and the config file
    pub fn from_env(config: &ReporterConfig) -> Self {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit environment lookup
    ///
    /// The server comes from the config file, else `STATS_SERVER`, and falls
    /// back to [`DEFAULT_STATISTICS_SERVER`] unless it contains "http". The
    /// project fields prefer the environment, then the config file, then the
    /// built-in defaults.
    pub fn resolve<F>(config: &ReporterConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = match config.server.clone().or_else(|| lookup(ENV_SERVER)) {
            Some(server) if server.contains("http") => server,
            other => {
                if let Some(rejected) = other {
                    tracing::warn!(
                        configured = %rejected,
                        fallback = DEFAULT_STATISTICS_SERVER,
                        "Statistics server is not a URL, using default"
                    );
                }
                DEFAULT_STATISTICS_SERVER.to_string()
            }
        };

        let pick = |env_key: &str, configured: &Option<String>, default: &str| {
            lookup(env_key)
                .or_else(|| configured.clone())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            server,
            project_name: pick(ENV_PROJECT_NAME, &config.project_name, DEFAULT_PROJECT_NAME),
            project_type: pick(ENV_PROJECT_TYPE, &config.project_type, DEFAULT_PROJECT_TYPE),
            version: pick(
                ENV_PROJECT_VERSION,
                &config.version,
                env!("CARGO_PKG_VERSION"),
            ),
        }
    }
}

/// Body POSTed to the collector
#[derive(Debug, Serialize)]
struct PublishPayload<'a> {
    project_name: &'a str,
    project_type: &'a str,
    version: &'a str,
    timestamp: u64,
    counters: &'a Snapshot,
}

/// HTTP publisher for the remote statistics collector
#[derive(Debug, Clone)]
pub struct StatsReporter {
    client: reqwest::Client,
    settings: ReporterSettings,
}

impl StatsReporter {
    /// Create a reporter with a request timeout
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(settings: ReporterSettings, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build reporter client: {}", e)))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ReporterSettings {
        &self.settings
    }

    fn now_unix_seconds() -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(e) => {
                tracing::error!(error = %e, "System clock is before UNIX epoch, reporting timestamp 0");
                0
            }
        }
    }
}

#[async_trait]
impl Publisher for StatsReporter {
    async fn publish(&self, snapshot: &Snapshot) -> AppResult<()> {
        let payload = PublishPayload {
            project_name: &self.settings.project_name,
            project_type: &self.settings.project_type,
            version: &self.settings.version,
            timestamp: Self::now_unix_seconds(),
            counters: snapshot,
        };

        let failed = |reason: String| AppError::PublishFailed {
            server: self.settings.server.clone(),
            reason,
        };

        let response = self
            .client
            .post(&self.settings.server)
            .json(&payload)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status.as_u16())));
        }

        tracing::debug!(
            server = %self.settings.server,
            counters = snapshot.len(),
            "Snapshot published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_uses_defaults_when_nothing_configured() {
        let settings = ReporterSettings::resolve(&ReporterConfig::default(), env(&[]));
        assert_eq!(settings.server, DEFAULT_STATISTICS_SERVER);
        assert_eq!(settings.project_name, "jainslee");
        assert_eq!(settings.project_type, "community");
        assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_resolve_falls_back_when_server_is_not_a_url() {
        let config = ReporterConfig {
            server: Some("statistics.local".to_string()),
            ..ReporterConfig::default()
        };
        let settings = ReporterSettings::resolve(&config, env(&[]));
        assert_eq!(settings.server, DEFAULT_STATISTICS_SERVER);
    }

    #[test]
    fn test_resolve_keeps_configured_url() {
        let config = ReporterConfig {
            server: Some("http://127.0.0.1:9000/rest/".to_string()),
            ..ReporterConfig::default()
        };
        let settings =
            ReporterSettings::resolve(&config, env(&[(ENV_SERVER, "https://ignored/")]));
        assert_eq!(settings.server, "http://127.0.0.1:9000/rest/");
    }

    #[test]
    fn test_resolve_reads_server_from_env_when_not_configured() {
        let settings = ReporterSettings::resolve(
            &ReporterConfig::default(),
            env(&[(ENV_SERVER, "https://stats.example.com/rest/")]),
        );
        assert_eq!(settings.server, "https://stats.example.com/rest/");
    }

    #[test]
    fn test_resolve_env_overrides_config_project_fields() {
        let config = ReporterConfig {
            project_name: Some("from-config".to_string()),
            project_type: Some("enterprise".to_string()),
            version: Some("1.2.3".to_string()),
            ..ReporterConfig::default()
        };
        let settings = ReporterSettings::resolve(
            &config,
            env(&[(ENV_PROJECT_NAME, "from-env"), (ENV_PROJECT_VERSION, "9.9.9")]),
        );
        assert_eq!(settings.project_name, "from-env");
        assert_eq!(settings.project_type, "enterprise");
        assert_eq!(settings.version, "9.9.9");
    }

    #[test]
    fn test_payload_serializes_counters_as_object() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("calls".to_string(), 3);
        let payload = PublishPayload {
            project_name: "jainslee",
            project_type: "community",
            version: "1.0.0",
            timestamp: 10,
            counters: &snapshot,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["counters"]["calls"], 3);
        assert_eq!(json["project_name"], "jainslee");
    }
}
