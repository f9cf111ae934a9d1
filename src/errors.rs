use axum::{Json, http::StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode row: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request to data store failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("data store responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no row {id} in {collection}")]
    NotFound { collection: &'static str, id: i64 },

    #[error("data store returned no row for a write")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum WeekError {
    #[error("unrecognized measurement field '{0}'")]
    InvalidField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("week {week_id} is not active")]
    NoActiveWeek { week_id: i64 },

    #[error("week {week_id} is completed and only accepts coach notes")]
    WeekCompleted { week_id: i64 },

    #[error("week {0} not found")]
    WeekNotFound(i64),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("inconsistent week history: {0}")]
    InconsistentHistory(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl From<serde_json::Error> for WeekError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageFailure(StoreError::Serialization(err))
    }
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StoreError::Serialization(err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("APP_STORE_URL is set but APP_STORE_KEY is missing")]
    MissingStoreKey,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Vec<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        error!("internal error: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "an internal error occurred")
    }
}

impl From<WeekError> for AppError {
    fn from(err: WeekError) -> Self {
        let status = match &err {
            WeekError::InvalidField(_) | WeekError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            WeekError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            WeekError::WeekNotFound(_) => StatusCode::NOT_FOUND,
            WeekError::NoActiveWeek { .. } | WeekError::WeekCompleted { .. } => StatusCode::CONFLICT,
            WeekError::MissingRequiredFields(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WeekError::InconsistentHistory(_) | WeekError::StorageFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        match err {
            WeekError::MissingRequiredFields(missing) => Self {
                status,
                message: "week is missing required fields".to_string(),
                details: missing,
            },
            other if status == StatusCode::INTERNAL_SERVER_ERROR => Self::internal(other),
            other => Self::new(status, other.to_string()),
        }
    }
}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            RosterError::InvalidCredentials => Self::unauthorized(err.to_string()),
            RosterError::Storage(inner) => Self::internal(inner),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = if self.details.is_empty() {
            json!({ "error": self.message })
        } else {
            json!({ "error": self.message, "details": self.details })
        };
        (self.status, Json(body)).into_response()
    }
}
