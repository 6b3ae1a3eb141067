use crate::handlers::{self, ApiState};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/r/{token}", get(handlers::view_report))
        .route("/r/{token}/pdf", get(handlers::download_report))
        .route("/r/{token}/email", post(handlers::email_report))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Run the public share server with graceful shutdown
pub async fn run_http_server(
    config: HttpServerConfig,
    state: ApiState,
    cancellation_token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting share server on {}", addr);

    let server = axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        info!("Share server shutdown signal received");
    });

    match server.await {
        Ok(_) => {
            info!("Share server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Share server error: {}", e);
            Err(e.into())
        }
    }
}
