use crate::routes::error::map_error;
use crate::routes::request_id;
use crate::routes::PathQuery;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use rl_core::types::{FileView, PreviousRound};
use tower_http::request_id::RequestId;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/file", get(get_file))
        .route("/file/previous", get(get_previous))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/file",
    params(PathQuery),
    responses((status = 200, body = FileView), (status = 404))
)]
pub(crate) async fn get_file(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.session.file(&query.path) {
        Ok(file) => Json(file).into_response(),
        Err(err) => map_error(&err, request_id(&id)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/file/previous",
    params(PathQuery),
    responses((status = 200, body = PreviousRound), (status = 404))
)]
pub(crate) async fn get_previous(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.session.previous_round(&query.path) {
        Ok(previous) => Json(previous).into_response(),
        Err(err) => map_error(&err, request_id(&id)).into_response(),
    }
}
