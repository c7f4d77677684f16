use std::sync::Arc;

use parcel_tracker::api;
use parcel_tracker::config::Config;
use parcel_tracker::error::AppError;
use parcel_tracker::state::AppState;
use parcel_tracker::store::Store;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store = match &config.data_file {
        Some(path) => Store::open(path)?,
        None => {
            tracing::warn!("DATA_FILE not set; records are kept in memory only");
            Store::in_memory()
        }
    };

    let state = Arc::new(AppState::new(
        store,
        config.event_buffer_size,
        config.bcrypt_cost,
    ));
    let app = api::rest::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
