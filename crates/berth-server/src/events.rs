//! Server-sent notification stream.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};

use crate::state::AppState;

/// `GET /api/events`: subscribes the caller to the event bus.
///
/// Each notification is written as one `data: <name>` frame. The
/// subscription ends, and the observer leaves the bus, when the client
/// disconnects and the body stream is dropped.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.orchestrator.bus().subscribe();
    tracing::debug!(observer = %subscription.id(), "event stream opened");
    Sse::new(
        subscription
            .into_stream()
            .map(|notification| Ok(Event::default().data(notification.as_str()))),
    )
}
