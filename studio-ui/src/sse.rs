//! Server-Sent Events stream of session changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use studio::session::SessionEvent;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::AppState;

/// SSE event name for each kind of session change.
fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::Message { .. } => "message",
        SessionEvent::Task { .. } => "task",
        SessionEvent::Artifact { .. } => "artifact",
        SessionEvent::Files => "files",
        SessionEvent::SaveStatus { .. } => "save_status",
        SessionEvent::Processing { .. } => "processing",
    }
}

fn to_sse(event: &SessionEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_name(event)).data(json)),
        Err(err) => {
            warn!(error = %err, "failed to serialize session event");
            None
        }
    }
}

/// SSE endpoint handler.
///
/// A client that falls behind receives `resync` and should refetch
/// `/api/session`.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.store().subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(session_event) => {
                    if let Some(event) = to_sse(&session_event) {
                        yield Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                    yield Ok(Event::default().event("resync").data("{}"));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use studio::session::SaveStatus;

    use super::*;

    #[test]
    fn event_names_match_payload_tags() {
        let events = [
            SessionEvent::Files,
            SessionEvent::SaveStatus {
                status: SaveStatus::Saving,
            },
            SessionEvent::Processing { active: true },
        ];
        for event in &events {
            let json = serde_json::to_value(event).expect("json");
            assert_eq!(json["type"], event_name(event));
        }
    }

    #[test]
    fn processing_payload_is_flat() {
        let json = serde_json::to_value(SessionEvent::Processing { active: false }).expect("json");
        assert_eq!(json, serde_json::json!({ "type": "processing", "active": false }));
        assert!(to_sse(&SessionEvent::Files).is_some());
    }
}
