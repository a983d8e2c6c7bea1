use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::DeviceInfo;
use crate::engine::Engine;
use crate::engine::EntityDescriptor;
use crate::engine::MatrixError;
use crate::engine::MatrixState;
use crate::engine::OutputView;

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
    config_version: u64,
    device: DeviceInfo,
}

/// Body for POST /v1/outputs/:id/source
#[derive(Debug, Deserialize)]
struct SelectSourceRequest {
    input: String,
}

/// Body for the rename endpoints
#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
}

#[derive(Serialize)]
struct RenameResponse {
    config_version: u64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Maps engine errors onto HTTP status codes
struct ApiError(MatrixError);

impl From<MatrixError> for ApiError {
    fn from(e: MatrixError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MatrixError::DeviceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            MatrixError::UnknownInput { .. }
            | MatrixError::InvalidName { .. }
            | MatrixError::InvalidId(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MatrixError::UnknownOutput(_) => StatusCode::NOT_FOUND,
            MatrixError::CommandFailed(_) | MatrixError::PollFailed(_) => StatusCode::BAD_GATEWAY,
            MatrixError::Reloading => StatusCode::CONFLICT,
            MatrixError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
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
            config_version: state.engine.snapshot().version,
            device: state.engine.device_info(),
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn matrix_state(State(state): State<Arc<AppState>>) -> Json<MatrixState> {
    Json(MatrixState::clone(&state.engine.store().current()))
}

/// Handler for GET /v1/outputs
#[tracing::instrument(skip(state))]
async fn outputs(State(state): State<Arc<AppState>>) -> Json<Vec<OutputView>> {
    Json(state.engine.controller().output_views())
}

/// Handler for POST /v1/outputs/:id/source
#[tracing::instrument(skip(state))]
async fn select_source(
    State(state): State<Arc<AppState>>,
    Path(output_id): Path<u8>,
    Json(body): Json<SelectSourceRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .controller()
        .select_source(output_id, &body.input)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PUT /v1/inputs/:id/name
#[tracing::instrument(skip(state))]
async fn rename_input(
    State(state): State<Arc<AppState>>,
    Path(input_id): Path<u8>,
    Json(body): Json<RenameRequest>,
) -> Result<(StatusCode, Json<RenameResponse>), ApiError> {
    let snapshot = state.engine.naming().rename_input(input_id, &body.name).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RenameResponse {
            config_version: snapshot.version,
        }),
    ))
}

/// Handler for PUT /v1/outputs/:id/name
#[tracing::instrument(skip(state))]
async fn rename_output(
    State(state): State<Arc<AppState>>,
    Path(output_id): Path<u8>,
    Json(body): Json<RenameRequest>,
) -> Result<(StatusCode, Json<RenameResponse>), ApiError> {
    let snapshot = state.engine.naming().rename_output(output_id, &body.name).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RenameResponse {
            config_version: snapshot.version,
        }),
    ))
}

/// Handler for GET /v1/entities
#[tracing::instrument(skip(state))]
async fn entities(State(state): State<Arc<AppState>>) -> Json<Vec<EntityDescriptor>> {
    Json(state.engine.entities())
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(matrix_state))
        .route("/v1/outputs", get(outputs))
        .route("/v1/outputs/:id/source", post(select_source))
        .route("/v1/outputs/:id/name", put(rename_output))
        .route("/v1/inputs/:id/name", put(rename_input))
        .route("/v1/entities", get(entities))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
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
