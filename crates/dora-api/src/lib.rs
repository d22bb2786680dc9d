//! # Dora HTTP Service
//!
//! HTTP server exposing the DORA metrics core.
//!
//! This service provides:
//! - A single webhook endpoint for GitHub, Bitbucket, Jira, Shortcut and
//!   direct API events
//! - Metrics and last-deployment queries
//! - A health check endpoint

pub mod config;
pub mod errors;
pub mod request;
pub mod responses;

pub use config::{LoggingConfig, MetricsConfig, ServerConfig, ServiceConfig, ShortcutConfig};
pub use errors::{ApiError, ConfigError, RequestError, ServiceError};
pub use request::{LastDeploymentQuery, MetricsQuery};
pub use responses::{EventResponse, HealthResponse};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use dora_core::{
    create_event, get_last_deployment, get_metrics, time,
    webhook::{assemble, is_sentinel, ParserSelector, WebhookHeaders, WebhookInput},
    LastDeployment, Metrics, Repository,
};
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, map_request_body::MapRequestBodyLayer,
    map_response_body::MapResponseBodyLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Event and metrics storage
    pub repository: Arc<dyn Repository>,

    /// Picks the provider parser for each webhook
    pub selector: ParserSelector,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        repository: Arc<dyn Repository>,
        selector: ParserSelector,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            selector,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route("/event", post(handle_event));

    let query_routes = Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/lastdeployment", get(handle_last_deployment));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let cors = if state.config.server.enable_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .merge(webhook_routes)
        .merge(query_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(
                    state.config.server.max_body_size,
                ))
                .layer(MapRequestBodyLayer::new(axum::body::Body::new))
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server and run until SIGINT or SIGTERM.
///
/// In-flight requests get `server.shutdown_timeout_seconds` to finish once a
/// signal arrives.
///
/// # Errors
///
/// Returns [`ServiceError::BindFailed`] if the listener cannot be bound and
/// [`ServiceError::ServerFailed`] if serving fails.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", address);

    let app = create_router(state);
    let signalled = Arc::new(Notify::new());

    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let signalled = signalled.clone();
            async move {
                shutdown_signal().await;
                info!(
                    "Initiating graceful shutdown with {}s timeout",
                    shutdown_timeout.as_secs()
                );
                signalled.notify_one();
            }
        })
        .into_future();

    let drain_deadline = async {
        signalled.notified().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "In-flight requests did not finish before the shutdown timeout"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Normalise and store a webhook from any supported provider
#[instrument(skip(state, headers, body), fields(body_size = body.len()))]
pub async fn handle_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventResponse>, ApiError> {
    let webhook_headers: WebhookHeaders = headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.to_str().unwrap_or("")))
        .collect();

    let input = WebhookInput::from_bytes(webhook_headers, &body)?;
    let parser = state.selector.select(&input.headers)?;
    let event = assemble(parser.as_ref(), &input).await?;

    if is_sentinel(&event) {
        info!(
            provider = %parser.provider(),
            "Webhook carries no trackable event, acknowledging without storing"
        );
        return Ok(Json(EventResponse::ignored()));
    }

    create_event(state.repository.as_ref(), &event).await?;

    info!(
        provider = %parser.provider(),
        repo = %event.repo,
        id = %event.id,
        "Webhook stored"
    );

    Ok(Json(EventResponse::stored()))
}

/// DORA metrics for one repo and range
#[instrument(skip(state, query), fields(repo = ?query.repo))]
pub async fn handle_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Metrics>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let request = query.into_request(today, state.config.metrics.max_date_range_days)?;

    let metrics = get_metrics(state.repository.as_ref(), &request, time::now_millis()).await?;
    Ok(Json(metrics))
}

/// Most recent deployment of a repo
#[instrument(skip(state, query), fields(repo = ?query.repo))]
pub async fn handle_last_deployment(
    State(state): State<AppState>,
    Query(query): Query<LastDeploymentQuery>,
) -> Result<Json<LastDeployment>, ApiError> {
    let repo = query.into_repo()?;
    let last = get_last_deployment(state.repository.as_ref(), &repo).await?;
    Ok(Json(last))
}

/// Basic health check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Log every request with a correlation id, echoed back in `x-correlation-id`
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
