//! Configuration management for usagestat
//!
//! Parses TOML configuration files and provides typed access to settings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for every timeout setting, in seconds
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub polling: PollingConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

/// Admin interface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9464
}

/// Polling schedule
///
/// Validated at deserialization time: `interval_seconds` must be positive and
/// `component_timeout_seconds`, when present, must be in (0, 300].
#[derive(Debug, Clone, Serialize)]
pub struct PollingConfig {
    interval_seconds: u64,
    component_timeout_seconds: Option<u64>,
}

impl PollingConfig {
    /// Create a validated polling configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is zero or the component timeout is
    /// zero or exceeds 300 seconds.
    pub fn new(
        interval_seconds: u64,
        component_timeout_seconds: Option<u64>,
    ) -> crate::error::AppResult<Self> {
        if interval_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "polling.interval_seconds must be greater than 0".to_string(),
            ));
        }
        if let Some(timeout) = component_timeout_seconds {
            validate_timeout("polling.component_timeout_seconds", timeout)?;
        }
        Ok(Self {
            interval_seconds,
            component_timeout_seconds,
        })
    }

    /// Polling interval in seconds
    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    /// Polling interval as a timer period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Per-component time limit, if configured
    pub fn component_timeout(&self) -> Option<Duration> {
        self.component_timeout_seconds.map(Duration::from_secs)
    }
}

/// Custom Deserialize implementation for PollingConfig
///
/// Calls the validated `new()` constructor so an invalid polling schedule can
/// never be represented.
impl<'de> Deserialize<'de> for PollingConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};
        use std::fmt;

        #[derive(Deserialize)]
        #[serde(field_identifier, rename_all = "snake_case")]
        enum Field {
            IntervalSeconds,
            ComponentTimeoutSeconds,
        }

        struct PollingConfigVisitor;

        impl<'de> Visitor<'de> for PollingConfigVisitor {
            type Value = PollingConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a struct with interval_seconds and optional component_timeout_seconds",
                )
            }

            fn visit_map<V>(self, mut map: V) -> Result<PollingConfig, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut interval_seconds = None;
                let mut component_timeout_seconds = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::IntervalSeconds => {
                            if interval_seconds.is_some() {
                                return Err(de::Error::duplicate_field("interval_seconds"));
                            }
                            interval_seconds = Some(map.next_value()?);
                        }
                        Field::ComponentTimeoutSeconds => {
                            if component_timeout_seconds.is_some() {
                                return Err(de::Error::duplicate_field(
                                    "component_timeout_seconds",
                                ));
                            }
                            component_timeout_seconds = Some(map.next_value()?);
                        }
                    }
                }

                let interval_seconds =
                    interval_seconds.ok_or_else(|| de::Error::missing_field("interval_seconds"))?;

                PollingConfig::new(interval_seconds, component_timeout_seconds)
                    .map_err(|e| de::Error::custom(format!("Invalid polling configuration: {}", e)))
            }
        }

        deserializer.deserialize_struct(
            "PollingConfig",
            &["interval_seconds", "component_timeout_seconds"],
            PollingConfigVisitor,
        )
    }
}

/// Remote statistics collector settings
///
/// Every field is optional; missing values are filled from the environment
/// and built-in defaults when the reporter is constructed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_reporter_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            server: None,
            project_name: None,
            project_type: None,
            version: None,
            timeout_seconds: default_reporter_timeout(),
        }
    }
}

fn default_reporter_timeout() -> u64 {
    10
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A component polled over HTTP
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentConfig {
    id: String,
    base_url: String,
}

impl ComponentConfig {
    /// Get the component id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the component base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn validate_timeout(field: &str, timeout: u64) -> crate::error::AppResult<()> {
    if timeout == 0 {
        return Err(crate::error::AppError::Config(format!(
            "{} must be greater than 0, got {}",
            field, timeout
        )));
    }
    if timeout > MAX_TIMEOUT_SECONDS {
        return Err(crate::error::AppError::Config(format!(
            "{} cannot exceed {} seconds (5 minutes), got {}",
            field, MAX_TIMEOUT_SECONDS, timeout
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            crate::error::AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| crate::error::AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`.
    pub fn validate(&self) -> crate::error::AppResult<()> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(crate::error::AppError::Config(format!(
                "server.host '{}' must be an IP address (e.g. 127.0.0.1 or 0.0.0.0)",
                self.server.host
            )));
        }

        validate_timeout("reporter.timeout_seconds", self.reporter.timeout_seconds)?;

        if !LOG_LEVELS.contains(&self.observability.log_level.as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "observability.log_level '{}' is not one of: {}",
                self.observability.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            if component.id.trim().is_empty() {
                return Err(crate::error::AppError::Config(
                    "components: id must not be empty".to_string(),
                ));
            }
            if !seen.insert(component.id.as_str()) {
                return Err(crate::error::AppError::Config(format!(
                    "components: duplicate id '{}'",
                    component.id
                )));
            }
            if !component.base_url.starts_with("http://")
                && !component.base_url.starts_with("https://")
            {
                return Err(crate::error::AppError::Config(format!(
                    "Component '{}' has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    component.id, component.base_url
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(toml_str).map_err(|source| {
            crate::error::AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            }
        })?;

        config.validate()?;
        Ok(config)
    }
}
