use crate::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(stream))
        .with_state(state)
}

/// Live session events as server-sent events. Each event's `event:` field is
/// its kind and `data:` is the JSON record.
#[utoipa::path(
    get,
    path = "/api/events",
    responses((status = 200, description = "text/event-stream of EventRecord"))
)]
pub(crate) async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = ReceiverStream::new(state.event_bus.subscribe()).map(|record| {
        let json = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(record.kind()).id(record.id.clone()).data(json))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
