use crate::config::ConfigError;
use crate::data::cache::CacheError;
use crate::scoring::ScoringConfigError;
use crate::service::ScoringError;
use crate::telemetry::TelemetryError;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    ScoringConfig(ScoringConfigError),
    Scoring(ScoringError),
    /// Malformed path segment or query string.
    Request(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) => "io",
            AppError::ScoringConfig(_) => "scoring_configuration",
            AppError::Scoring(err) => err.kind(),
            AppError::Request(_) => "invalid_request",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Scoring(err) => scoring_status(err),
            AppError::Request(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::ScoringConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn scoring_status(err: &ScoringError) -> StatusCode {
    match err {
        ScoringError::UnknownTerm(_) | ScoringError::MepNotFound { .. } => StatusCode::NOT_FOUND,
        ScoringError::UnknownCategory(_) | ScoringError::InvalidPage { .. } => {
            StatusCode::BAD_REQUEST
        }
        ScoringError::Data(data) => match data {
            CacheError::DatasetUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::InvalidDataset(_) => StatusCode::BAD_REQUEST,
            CacheError::Unreadable { .. }
            | CacheError::ParseFailure { .. }
            | CacheError::LoadAborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::ScoringConfig(err) => write!(f, "{}", err),
            AppError::Scoring(err) => write!(f, "{}", err),
            AppError::Request(message) => write!(f, "invalid request: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::ScoringConfig(err) => Some(err),
            AppError::Scoring(err) => Some(err),
            AppError::Request(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, kind = self.kind(), "request failed");
        }

        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ScoringConfigError> for AppError {
    fn from(value: ScoringConfigError) -> Self {
        Self::ScoringConfig(value)
    }
}

impl From<ScoringError> for AppError {
    fn from(value: ScoringError) -> Self {
        Self::Scoring(value)
    }
}

impl From<PathRejection> for AppError {
    fn from(value: PathRejection) -> Self {
        Self::Request(value.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(value: QueryRejection) -> Self {
        Self::Request(value.body_text())
    }
}
