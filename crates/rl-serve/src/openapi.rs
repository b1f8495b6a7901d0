use utoipa::OpenApi;

use crate::routes::error::ErrorEnvelope;
use crate::routes::rounds::RoundAccepted;
use crate::routes::PathQuery;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use rl_core::types::{
    Comment, DiffEntry, DiffHunk, DiffLine, DiffLineKind, DiffOp, DiffSide, FileStatus,
    FileSummary, FileType, FileView, FinishSummary, NewComment, PreviousRound, RoundSummary,
    SessionMode, SessionSnapshot, ShareInput, UpdateComment,
};
use rl_events::types::{EventRecord, ReviewEvent};

#[derive(OpenApi)]
#[openapi(
    info(title = "redline", description = "Local multi-round review sessions"),
    paths(
        crate::routes::session::get_session,
        crate::routes::session::get_summary,
        crate::routes::session::finish,
        crate::routes::files::get_file,
        crate::routes::files::get_previous,
        crate::routes::comments::list_comments,
        crate::routes::comments::add_comment,
        crate::routes::comments::update_comment,
        crate::routes::comments::delete_comment,
        crate::routes::rounds::round_complete,
        crate::routes::share::set_share,
        crate::routes::share::clear_share,
        crate::routes::events::stream
    ),
    components(schemas(
        SessionSnapshot,
        FileSummary,
        FileView,
        PreviousRound,
        RoundSummary,
        FinishSummary,
        ShareInput,
        Comment,
        NewComment,
        UpdateComment,
        DiffEntry,
        DiffHunk,
        DiffLine,
        DiffLineKind,
        DiffOp,
        DiffSide,
        FileStatus,
        FileType,
        SessionMode,
        PathQuery,
        RoundAccepted,
        ErrorEnvelope,
        EventRecord,
        ReviewEvent
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
