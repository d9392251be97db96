//! Extraction progress as Server-Sent Events.

use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use crate::state::AppState;

const PROGRESS_PERIOD: Duration = Duration::from_millis(500);

/// `GET /progress`
///
/// Emits `{"processed":n,"total":m}` every 500 ms and closes after a final
/// `{"complete":true}` once the current run has processed every file.
pub async fn progress(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .progress
        .updates(PROGRESS_PERIOD)
        .map(|update| Event::default().json_data(update));
    Sse::new(stream).keep_alive(KeepAlive::default())
}
