use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct RoundAccepted {
    /// `false` when a transition was already queued and this request merged
    /// into it.
    pub queued: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/round-complete", post(round_complete))
        .with_state(state)
}

/// Queues a round transition. The watcher runs it; progress is reported on
/// the event stream.
#[utoipa::path(
    post,
    path = "/api/round-complete",
    responses((status = 202, body = RoundAccepted))
)]
pub(crate) async fn round_complete(
    State(state): State<AppState>,
) -> (StatusCode, Json<RoundAccepted>) {
    let queued = state.rounds.notify();
    tracing::debug!(queued, "round complete requested");
    (StatusCode::ACCEPTED, Json(RoundAccepted { queued }))
}
