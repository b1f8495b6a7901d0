pub mod comments;
pub mod error;
pub mod events;
pub mod files;
pub mod rounds;
pub mod session;
pub mod share;

use crate::{openapi, AppState};
use axum::Router;
use serde::Deserialize;
use tower_http::request_id::RequestId;
use utoipa::{IntoParams, ToSchema};

/// Files are addressed by their repository-relative path, which may contain
/// slashes, so it travels in the query string rather than the URL path.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct PathQuery {
    pub path: String,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(session::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(comments::router(state.clone()))
        .merge(rounds::router(state.clone()))
        .merge(share::router(state.clone()))
        .merge(events::router(state))
        .merge(openapi::router());

    Router::new().nest("/api", api)
}

/// The id stamped by the request-id layer, echoed into error bodies.
pub(crate) fn request_id(id: &RequestId) -> Option<String> {
    id.header_value().to_str().ok().map(str::to_string)
}
