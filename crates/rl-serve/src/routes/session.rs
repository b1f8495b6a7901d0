use crate::routes::error::map_error;
use crate::routes::request_id;
use crate::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use rl_core::RedlineError;
use rl_core::types::{FinishSummary, RoundSummary, SessionSnapshot};
use tower_http::request_id::RequestId;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/summary", get(get_summary))
        .route("/session/finish", post(finish))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/session",
    responses((status = 200, body = SessionSnapshot))
)]
pub(crate) async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

#[utoipa::path(
    get,
    path = "/api/session/summary",
    responses((status = 200, body = RoundSummary))
)]
pub(crate) async fn get_summary(State(state): State<AppState>) -> Json<RoundSummary> {
    Json(state.session.round_summary())
}

/// Writes the state file now instead of waiting for the debounce.
#[utoipa::path(
    post,
    path = "/api/session/finish",
    responses((status = 200, body = FinishSummary))
)]
pub(crate) async fn finish(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
) -> Response {
    let session = state.session.clone();
    let finished = tokio::task::spawn_blocking(move || session.finish())
        .await
        .unwrap_or_else(|err| {
            Err(RedlineError::Internal {
                message: format!("finish task failed: {err}"),
            })
        });
    match finished {
        Ok(summary) => {
            tracing::info!(
                comments = summary.comment_count,
                path = %summary.state_path.display(),
                "review finished"
            );
            Json(summary).into_response()
        }
        Err(err) => map_error(&err, request_id(&id)).into_response(),
    }
}
