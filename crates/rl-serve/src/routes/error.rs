use axum::http::StatusCode;
use axum::Json;
use rl_core::error::{CommentError, PersistError, SourceError};
use rl_core::RedlineError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub request_id: Option<String>,
}

pub fn map_error(
    err: &RedlineError,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code, message) = match err {
        RedlineError::Comment(comment) => map_comment_error(comment),
        RedlineError::Persist(persist) => map_persist_error(persist),
        RedlineError::Source(source) => map_source_error(source),
        RedlineError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            message.clone(),
        ),
    };
    if status.is_server_error() {
        tracing::error!(code, %message, "request failed");
    }

    (
        status,
        Json(ErrorEnvelope {
            code,
            message,
            request_id,
        }),
    )
}

fn map_comment_error(err: &CommentError) -> (StatusCode, &'static str, String) {
    match err {
        CommentError::FileNotFound { .. } | CommentError::CommentNotFound { .. } => {
            (StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        CommentError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
    }
}

fn map_persist_error(err: &PersistError) -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        err.to_string(),
    )
}

fn map_source_error(err: &SourceError) -> (StatusCode, &'static str, String) {
    match err {
        SourceError::RepoNotFound | SourceError::RefNotFound { .. } => {
            (StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        SourceError::NoFiles
        | SourceError::ReadFailed { .. }
        | SourceError::DiffFailed { .. }
        | SourceError::BackendError { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            err.to_string(),
        ),
    }
}
