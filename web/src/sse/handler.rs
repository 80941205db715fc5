use crate::params::job_event::WatermarkParams;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::{header, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use chrono::Utc;
use events::{Connected, EventType};
use log::*;
use service::AppState;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;

/// Unregisters the connection when the stream is dropped, whichever teardown
/// trigger fires first: client close, network abort, or a failed send. The
/// registry removal is idempotent, so overlapping triggers are harmless.
struct ConnectionGuard {
    app_state: AppState,
    client_id: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("Stream connection {} closed, cleaning up", self.client_id);
        self.app_state.hub.unregister_connection(self.client_id);
    }
}

/// SSE handler establishing a long-lived connection for real-time job events.
///
/// Connection lifecycle: prune the buffer, snapshot the events the caller
/// missed since its `last_seen` watermark, register the outbound channel,
/// then emit the handshake, the replayed backfill in ascending order, and
/// finally whatever the hub broadcasts while the connection stays open.
pub(crate) async fn stream_handler(
    State(app_state): State<AppState>,
    Query(params): Query<WatermarkParams>,
) -> impl IntoResponse {
    let (tx, mut rx) = mpsc::unbounded_channel();

    app_state.hub.prune(Utc::now().timestamp_millis());
    let missed = app_state.hub.events_since(params.last_seen);
    let client_id = app_state.hub.register_connection(tx);
    debug!(
        "Establishing stream connection {client_id}, replaying {} missed event(s)",
        missed.len()
    );

    let keepalive_interval = Duration::from_secs(app_state.config.stream_keepalive_secs);
    let guard = ConnectionGuard {
        app_state,
        client_id,
    };

    let stream = stream! {
        let _guard = guard;

        match serde_json::to_string(&Connected::new(client_id)) {
            Ok(json) => {
                yield Ok::<_, Infallible>(Event::default().event("connected").data(json));
            }
            Err(e) => error!("Failed to serialize handshake frame: {e}"),
        }

        for missed_event in missed {
            let replayed = missed_event.into_replayed();
            match serde_json::to_string(&replayed) {
                Ok(json) => yield Ok(Event::default().event(replayed.event_type()).data(json)),
                Err(e) => error!("Failed to serialize replayed event: {e}"),
            }
        }

        // Live frames arrive pre-serialized from the hub's broadcast.
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(keepalive_interval)
                .text("keep-alive"),
        ),
    )
}
