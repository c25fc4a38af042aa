//! HTTP API for DermAssist.
//!
//! - `POST /predict`: classify an uploaded skin image
//! - `POST /chat`: one conversational turn within a session
//! - `GET /health`: liveness
//!
//! Built on Axum. Every handler catches internal errors at its boundary;
//! details are logged, never returned to callers.

pub mod api;
pub mod bootstrap;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use dermassist_assistant::Assistant;
use dermassist_config::{AppConfig, GatewayConfig};
use dermassist_core::classification::Classifier;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Header carrying the session id when the body does not.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared application state.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub assistant: Arc<Assistant>,
}

pub type SharedState = Arc<AppState>;

/// Build the router with all routes and layers.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(api::predict_handler))
        .route("/chat", post(api::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(cors_layer(&gateway.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for the browser frontend. No configured origins means any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the HTTP server with components built from `config`.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState {
        classifier: bootstrap::build_classifier(&config),
        assistant: Arc::new(bootstrap::build_assistant(&config)?),
    });

    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        model = %config.default_model,
        classifier = %config.classifier.endpoint,
        retrieval = %config.retrieval.backend,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
