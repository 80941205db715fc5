use log::{debug, error, info};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    let listen_addr = config.listen_addr();
    let prune_interval = Duration::from_secs(config.buffer_prune_interval_secs);

    let hub = Arc::new(sse::Hub::new());
    let app_state = AppState::new(config, &hub);

    // Background TTL sweep, so expired events leave the buffer even when no
    // reconnect triggers a prune.
    let pruner = tokio::spawn({
        let hub = hub.clone();
        async move {
            let mut interval = tokio::time::interval(prune_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = hub.prune(sse::Hub::now_ms());
                if removed > 0 {
                    debug!("Pruned {removed} expired event(s) from the buffer");
                }
            }
        }
    });

    info!("Server starting... Listening on {listen_addr}");

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {listen_addr}: {e}");
            return;
        }
    };

    let router = web::router::define_routes(app_state);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
    }

    pruner.abort();
    info!("Server shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
