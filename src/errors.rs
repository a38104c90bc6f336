use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<rusqlite::Error>() {
            Ok(db) => AppError::Database(db),
            Err(other) => AppError::Upstream(format!("{other:#}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Failure taxonomy of a single conversational turn.
///
/// Everything except `Upstream` is recoverable inside the dialogue and is
/// turned into a re-prompt; `Upstream` is caught at the turn boundary and
/// replaced by a generic apology.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("missing or invalid: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("slot already booked: {0}")]
    Conflict(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}
