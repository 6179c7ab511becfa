use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/entities
///
/// Serves the engine's current entity state snapshot.
#[tracing::instrument(skip(state))]
async fn entities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/entities request");
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(crate::engine::State::clone(&snapshot)))
}

/// Handler for POST /v1/integrations/:name/refresh
///
/// Requests one out-of-schedule poll cycle from an integration.
#[tracing::instrument(skip(state))]
async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.engine.request_refresh(&name) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::debug!("refresh request rejected: {}", e);
            StatusCode::NOT_FOUND
        }
    }
}

/// Handler for POST /v1/entities/:id/refresh
///
/// Like the integration refresh, but addressed by entity id; the engine
/// resolves the owning integration.
#[tracing::instrument(skip(state))]
async fn entity_refresh(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.request_entity_refresh(&id) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::debug!("entity refresh request rejected: {}", e);
            StatusCode::NOT_FOUND
        }
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/entities", get(entities))
        .route("/v1/entities/:id/refresh", post(entity_refresh))
        .route("/v1/integrations/:name/refresh", post(refresh))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to the specified address, serves the API endpoints, and runs
/// until the provided shutdown signal is triggered.
pub async fn serve(
    engine: Arc<Engine>,
    listen: String,
    port: u16,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
