use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// One entry of the `errors` list carried by validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation { message: message.into(), errors }
    }

    /// A validation failure for a single field.
    pub fn invalid_field(message: impl Into<String>, field: &str, reason: impl Into<String>) -> Self {
        Self::validation(message, vec![FieldError::new(field, reason)])
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation { .. } | InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Unauthorized(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            Conflict(_) => StatusCode::CONFLICT,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation { message, errors } => json!({
                "status": "error",
                "message": message,
                "errors": errors,
            }),
            AppError::Internal(err) => {
                tracing::error!(error = %err, backtrace = %err.backtrace(), "internal error");
                json!({
                    "status": "error",
                    "message": "Internal server error",
                })
            }
            other => json!({
                "status": "error",
                "message": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text(), Vec::new())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        let PathRejection::FailedToDeserializePathParams(err) = &rejection else {
            return Self::Internal(anyhow::anyhow!(rejection.body_text()));
        };
        let key = match err.kind() {
            ErrorKind::ParseErrorAtKey { key, .. }
            | ErrorKind::DeserializeError { key, .. }
            | ErrorKind::InvalidUtf8InPathParam { key } => Some(key.as_str()),
            _ => None,
        };
        match key {
            Some(key) => Self::invalid_field(format!("Invalid {key}"), key, err.body_text()),
            None => Self::validation(err.body_text(), Vec::new()),
        }
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(uuid::Error);
apperr_impl!(time::error::Format);
apperr_impl!(time::error::Parse);
apperr_impl!(tokio::task::JoinError);

/// True when a database error comes from a UNIQUE constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::validation("bad", vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthenticated("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn sqlx_errors_are_internal() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
