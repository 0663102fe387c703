pub mod handlers;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use echo_core::config::ServerConfig;

pub use handlers::ApiState;

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn router(state: ApiState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route(
            "/sessions/{id}",
            get(handlers::handle_session_inspect).delete(handlers::handle_session_end),
        )
        .route("/analysis/message", post(handlers::handle_analyze_message))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/ws", get(handlers::handle_ws))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(cors_layer(config))
}

pub async fn serve(
    state: ApiState,
    config: ServerConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state, &config);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
