//! HTTP API gateway for FinanBot.
//!
//! Exposes health checks, session management, streamed turns (SSE), the
//! economic indicator lookup, and retrieval status.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use chrono::{DateTime, Utc};
use finanbot_agent::AdvisorService;
use finanbot_economy::EconomicResolver;
use finanbot_retrieval::DocumentIndex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

/// Largest accepted request body.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: AdvisorService,
    pub index: Option<Arc<DocumentIndex>>,
    pub economy: Option<Arc<EconomicResolver>>,
    pub provider_name: String,
    pub documents_dir: String,
    pub start_time: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(service: AdvisorService) -> Self {
        Self {
            service,
            index: None,
            economy: None,
            provider_name: String::new(),
            documents_dir: String::new(),
            start_time: Utc::now(),
        }
    }

    pub fn with_index(mut self, index: Option<Arc<DocumentIndex>>) -> Self {
        self.index = index;
        self
    }

    pub fn with_economy(mut self, economy: Option<Arc<EconomicResolver>>) -> Self {
        self.economy = economy;
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn with_documents_dir(mut self, dir: impl Into<String>) -> Self {
        self.documents_dir = dir.into();
        self
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with all gateway routes.
pub fn build_router(state: SharedState, port: u16) -> Router {
    // Same-origin browser clients only.
    let origins = [
        format!("http://localhost:{port}"),
        format!("http://127.0.0.1:{port}"),
    ]
    .into_iter()
    .filter_map(|o| HeaderValue::from_str(&o).ok())
    .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(
    state: SharedState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let sweeper = spawn_session_sweeper(state.clone());
    let app = build_router(state, port);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

/// Periodically drop sessions whose clients went away without ending them.
pub fn spawn_session_sweeper(state: SharedState) -> tokio::task::JoinHandle<()> {
    let period = (state.service.sessions().idle_ttl() / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.service.sessions().evict_idle().await;
        }
    })
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_support::test_state(), 8501);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_drops_abandoned_sessions() {
        let state = test_support::test_state();
        let ttl = state.service.sessions().idle_ttl();
        state.service.start_session().await;
        let sweeper = spawn_session_sweeper(state.clone());

        tokio::time::sleep(ttl * 2).await;
        assert_eq!(state.service.sessions().count().await, 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn cors_allows_local_origin() {
        let app = build_router(test_support::test_state(), 8501);

        let req = Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:8501")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:8501")
        );
    }
}
