//! Error types for usagestat
//!
//! `AppError` covers configuration, publishing and the admin interface and
//! implements `IntoResponse` for Axum handlers. `SourceError` covers failures
//! of a single component's metric source; those never leave a polling cycle.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Publishing snapshot to {server} failed: {reason}")]
    PublishFailed { server: String, reason: String },

    #[error("Counter not found: {0}")]
    CounterNotFound(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::CounterNotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::PublishFailed { .. }
            | Self::Metrics(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

/// Failure of a component's metric source
///
/// Every variant is recoverable: the polling cycle logs it and degrades only
/// the affected metric or component.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Metric source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid metric source URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_creates() {
        let err = AppError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_publish_failed_names_server() {
        let err = AppError::PublishFailed {
            server: "https://stats.example.com/rest/".to_string(),
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Publishing snapshot to https://stats.example.com/rest/ failed: HTTP 503"
        );
    }

    #[test]
    fn test_counter_not_found_response_status() {
        let response = AppError::CounterNotFound("calls".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_publish_failed_response_status() {
        // Publish failures are folded into the cycle report; reaching a
        // handler as an error is an internal fault
        let err = AppError::PublishFailed {
            server: "x".to_string(),
            reason: "y".to_string(),
        };
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_response_status() {
        let response = AppError::Internal("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_source_error_messages() {
        let err = SourceError::Status {
            url: "http://127.0.0.1:8081/usage".to_string(),
            status: 500,
        };
        assert_eq!(err.to_string(), "http://127.0.0.1:8081/usage returned HTTP 500");

        let err = SourceError::UnknownMetric("calls".to_string());
        assert_eq!(err.to_string(), "Unknown metric: calls");
    }
}
