use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_core::error::CoreError;
use beacon_engine::{EngineError, StoreError};
use serde_json::{json, Map, Value};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`EngineError`] for send
/// outcomes that must report the notification they belong to. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `beacon_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A send that failed after its notification row was created.
    #[error(transparent)]
    Engine(EngineError),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(core) => AppError::Core(core),
            EngineError::Store(StoreError::Database(db)) => AppError::Database(db),
            EngineError::Store(StoreError::Unavailable(msg)) => AppError::InternalError(msg),
            other => AppError::Engine(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = Map::new();
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Engine(err) => {
                if let Some(id) = err.notification_id() {
                    extra.insert("notificationId".into(), json!(id));
                }
                classify_engine_error(err, &mut extra)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = Map::new();
        body.insert("error".into(), Value::String(message));
        body.insert("code".into(), Value::String(code.into()));
        body.extend(extra);

        (status, axum::Json(Value::Object(body))).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, "CONFLICT", core.to_string()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn classify_engine_error(err: &EngineError, extra: &mut Map<String, Value>) -> (StatusCode, &'static str, String) {
    match err {
        EngineError::NoEligibleRecipients { .. } => {
            extra.insert("audienceCount".into(), json!(0));
            (StatusCode::BAD_REQUEST, "NO_RECIPIENTS", err.to_string())
        }
        EngineError::QuotaExceeded { quota, .. } => {
            extra.insert("quota".into(), json!(quota));
            (StatusCode::FORBIDDEN, "QUOTA_EXCEEDED", err.to_string())
        }
        EngineError::DispatchFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "DISPATCH_FAILED", err.to_string())
        }
        EngineError::Core(core) | EngineError::StatusConflict { source: core, .. } => classify_core_error(core),
        EngineError::Persistence { .. } | EngineError::Store(_) => {
            tracing::error!(error = %err, "Notification persistence failure");
            internal()
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
