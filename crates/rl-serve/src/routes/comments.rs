use crate::routes::error::map_error;
use crate::routes::request_id;
use crate::routes::PathQuery;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use rl_core::types::{Comment, NewComment, UpdateComment};
use tower_http::request_id::RequestId;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/file/comments", get(list_comments).post(add_comment))
        .route(
            "/file/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/file/comments",
    params(PathQuery),
    responses((status = 200, body = Vec<Comment>), (status = 404))
)]
pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.session.comments(&query.path) {
        Ok(comments) => Json(comments).into_response(),
        Err(err) => map_error(&err, request_id(&id)).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/file/comments",
    params(PathQuery),
    request_body = NewComment,
    responses((status = 201, body = Comment), (status = 400), (status = 404))
)]
pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    Query(query): Query<PathQuery>,
    Json(input): Json<NewComment>,
) -> Response {
    match state.session.add_comment(&query.path, input) {
        Ok(comment) => (StatusCode::CREATED, Json(comment)).into_response(),
        Err(err) => map_error(&err, request_id(&id)).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/file/comments/{id}",
    params(("id" = u32, Path, description = "Comment id within the file"), PathQuery),
    request_body = UpdateComment,
    responses((status = 200, body = Comment), (status = 404))
)]
pub(crate) async fn update_comment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
    Json(input): Json<UpdateComment>,
) -> Response {
    match state.session.update_comment(&query.path, id, input) {
        Ok(comment) => Json(comment).into_response(),
        Err(err) => map_error(&err, request_id(&req_id)).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/file/comments/{id}",
    params(("id" = u32, Path, description = "Comment id within the file"), PathQuery),
    responses((status = 204), (status = 404))
)]
pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<u32>,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.session.delete_comment(&query.path, id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_error(&err, request_id(&req_id)).into_response(),
    }
}
