use crate::controller::{health_check_controller, job_event_controller};
use crate::sse::handler;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use log::*;
use service::AppState;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Talent Platform Notification API"
        ),
        paths(
            job_event_controller::create,
            job_event_controller::index,
            job_event_controller::status,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                events::JobEvent,
                events::JobEventKind,
                events::Connected,
                crate::params::job_event::CreateParams,
                crate::response::job_event::IngestResponse,
                crate::response::job_event::PollResponse,
                crate::response::job_event::StatusResponse,
            )
        ),
        tags(
            (name = "talent_platform", description = "Real-time job event delivery API")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);
    Router::new()
        .merge(job_event_routes(app_state.clone()))
        .merge(notification_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(cors)
}

fn job_event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/jobs/events", post(job_event_controller::create))
        .route("/jobs/events", get(job_event_controller::index))
        .with_state(app_state)
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications/stream", get(handler::stream_handler))
        .route("/notifications/status", get(job_event_controller::status))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed CORS origin {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
