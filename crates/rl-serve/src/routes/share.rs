use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rl_core::types::ShareInput;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/share", post(set_share).delete(clear_share))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/share",
    request_body = ShareInput,
    responses((status = 204))
)]
pub(crate) async fn set_share(
    State(state): State<AppState>,
    Json(input): Json<ShareInput>,
) -> StatusCode {
    state.session.set_share(input);
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    delete,
    path = "/api/share",
    responses((status = 204))
)]
pub(crate) async fn clear_share(State(state): State<AppState>) -> StatusCode {
    state.session.clear_share();
    StatusCode::NO_CONTENT
}
