//! # Server Configuration
//!
//! This module contains the server setup and configuration for the repopin API.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::engine::orchestrator::RunLocks;
use crate::handlers;
use crate::hosting::HostingFactory;
use crate::rate_limit::RateLimiter;
use crate::telemetry::{self, TraceContext};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub rate_limiter: Arc<RateLimiter>,
    pub run_locks: Arc<RunLocks>,
    pub hosting: Arc<dyn HostingFactory>,
}

/// Propagates a per-request trace context so error responses carry a
/// correlation id. Honors an incoming `X-Request-Id` when present.
async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let context = TraceContext { trace_id };
    request.extensions_mut().insert(context.clone());
    telemetry::with_trace_context(context, next.run(request)).await
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/sync/{secret}", post(handlers::sync::trigger_sync))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    rate_limiter: Arc<RateLimiter>,
    hosting: Arc<dyn HostingFactory>,
) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let profile = config.profile.clone();

    let state = AppState {
        config,
        db,
        rate_limiter,
        run_locks: Arc::new(RunLocks::new()),
        hosting,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::sync::trigger_sync,
    ),
    components(
        schemas(
            crate::handlers::ServiceInfo,
            crate::handlers::sync::SyncDisabledResponse,
            crate::handlers::sync::SyncSkippedResponse,
            crate::handlers::sync::SyncCompletedResponse,
            crate::engine::SyncResult,
            crate::engine::SyncStatus,
        )
    ),
    info(
        title = "Repopin API",
        description = "Repository order synchronization service",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
