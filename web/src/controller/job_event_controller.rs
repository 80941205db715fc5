use crate::error::{invalid, Result as WebResult};
use crate::params::job_event::{CreateParams, WatermarkParams};
use crate::response::job_event::{IngestResponse, PollResponse, StatusResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use events::JobEvent;
use log::*;
use service::AppState;

/// POST accept a job event from the rest of the application, buffer it, and
/// fan it out to every connected stream client.
///
/// A kind outside the allowed set is rejected by body deserialization with
/// 422 before anything is stored or broadcast. Downstream delivery failures
/// are swallowed by the hub's dead-channel sweep and never fail this call.
#[utoipa::path(
    post,
    path = "/jobs/events",
    request_body = CreateParams,
    responses(
        (status = 200, description = "Event stored and fan-out attempted", body = IngestResponse),
        (status = 422, description = "Malformed event kind")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    payload: Result<Json<CreateParams>, JsonRejection>,
) -> WebResult<impl IntoResponse> {
    let Json(params) = payload.map_err(|e| invalid(&e.body_text()))?;

    let event = JobEvent {
        kind: params.kind,
        title: params.title,
        company: params.company,
        posted_by: params.posted_by,
        job_id: params.job_id,
        occurred_at: Utc::now().timestamp_millis(),
        replayed: false,
    };

    let delivered_to = app_state.hub.publish(event);
    debug!("Ingested job event, delivery attempted to {delivered_to} client(s)");

    Ok(Json(IngestResponse {
        accepted: true,
        delivered_to,
    }))
}

/// GET buffered events newer than the caller's watermark. This is the polling
/// safety net: clients without a live stream call it on a timer, and clients
/// with one still sweep it periodically to catch frames lost to transient
/// send failures.
#[utoipa::path(
    get,
    path = "/jobs/events",
    params(WatermarkParams),
    responses(
        (status = 200, description = "Events newer than the watermark, ascending", body = PollResponse)
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Query(params): Query<WatermarkParams>,
) -> impl IntoResponse {
    let events = app_state.hub.events_since(params.last_seen);
    Json(PollResponse { events })
}

/// GET read-only hub introspection: connected clients, buffered events, and
/// the most recent few entries.
#[utoipa::path(
    get,
    path = "/notifications/status",
    responses(
        (status = 200, description = "Current hub counters and recent events", body = StatusResponse)
    )
)]
pub async fn status(State(app_state): State<AppState>) -> impl IntoResponse {
    let stats = app_state.hub.stats();
    Json(StatusResponse {
        connected_clients: stats.connected_clients,
        buffered_events: stats.buffered_events,
        recent_events: stats.recent_events,
    })
}
