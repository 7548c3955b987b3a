//! REST API over the native value store
//!
//! This is the native side's window into the node: read what inbound bridges
//! received, write values for outbound bridges to publish.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::AuthConfig;
use crate::error::BridgeError;
use crate::node::{Direction, NativeEntry, NativeStore, NativeWriter};
use crate::value::{NativeValue, ValueKind};

pub mod auth;

use auth::AuthState;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: NativeStore,
    pub writer: NativeWriter,
    pub node_name: String,
    pub metrics_handle: Option<PrometheusHandle>,
    pub auth: AuthConfig,
}

impl ApiState {
    pub fn new(store: NativeStore, writer: NativeWriter, node_name: &str) -> Self {
        Self {
            store,
            writer,
            node_name: node_name.to_string(),
            metrics_handle: None,
            auth: AuthConfig::default(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }
}

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    let auth_state = Arc::new(AuthState::new(state.auth.clone()));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/api/bridges", get(list_bridges))
        .route("/api/bridges/*channel", get(get_bridge).put(write_bridge))
        .layer(middleware::from_fn_with_state(auth_state, auth::api_key_auth))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    node: String,
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        node: state.node_name.clone(),
    })
}

async fn render_metrics(State(state): State<Arc<ApiState>>) -> Result<String, StatusCode> {
    state
        .metrics_handle
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Serialize)]
struct BridgeListResponse {
    bridges: Vec<BridgeResponse>,
}

#[derive(Serialize)]
struct BridgeResponse {
    channel: String,
    direction: Direction,
    native_type: ValueKind,
    wire_type: &'static str,
    value: Option<NativeValue>,
    timestamp: Option<String>,
    messages: u64,
}

impl From<NativeEntry> for BridgeResponse {
    fn from(entry: NativeEntry) -> Self {
        Self {
            channel: entry.channel,
            direction: entry.direction,
            native_type: entry.native_type,
            wire_type: entry.wire_type,
            value: entry.value,
            timestamp: entry.timestamp.map(|t| t.to_rfc3339()),
            messages: entry.messages,
        }
    }
}

async fn list_bridges(State(state): State<Arc<ApiState>>) -> Json<BridgeListResponse> {
    let bridges = state
        .store
        .list()
        .await
        .into_iter()
        .map(BridgeResponse::from)
        .collect();

    Json(BridgeListResponse { bridges })
}

async fn get_bridge(
    State(state): State<Arc<ApiState>>,
    Path(channel): Path<String>,
) -> Result<Json<BridgeResponse>, ApiError> {
    let entry = state
        .store
        .get(&channel)
        .await
        .ok_or_else(|| ApiError::from(BridgeError::UnknownChannel(channel.clone())))?;

    Ok(Json(entry.into()))
}

#[derive(Deserialize)]
struct WriteBody {
    value: serde_json::Value,
}

async fn write_bridge(
    State(state): State<Arc<ApiState>>,
    Path(channel): Path<String>,
    Json(body): Json<WriteBody>,
) -> Result<Json<BridgeResponse>, ApiError> {
    let entry = state
        .store
        .get(&channel)
        .await
        .ok_or_else(|| ApiError::from(BridgeError::UnknownChannel(channel.clone())))?;

    let value = NativeValue::from_json(entry.native_type, &body.value).ok_or_else(|| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!(
                "channel {} carries {} values, got {}",
                channel, entry.native_type, body.value
            ),
        )
    })?;

    state.writer.write(&channel, value).await?;

    let entry = state
        .store
        .get(&channel)
        .await
        .ok_or_else(|| ApiError::from(BridgeError::UnknownChannel(channel.clone())))?;
    Ok(Json(entry.into()))
}

/// JSON error body with its status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        let status = match &err {
            BridgeError::UnknownChannel(_) => StatusCode::NOT_FOUND,
            BridgeError::WrongDirection { .. } => StatusCode::CONFLICT,
            BridgeError::TypeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BridgeError::NodeStopped => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Transport(_) => StatusCode::BAD_GATEWAY,
            BridgeError::ChannelInUse { .. }
            | BridgeError::EmptyChannel(_)
            | BridgeError::Codec(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self
            .status
            .canonical_reason()
            .unwrap_or("error")
            .to_lowercase()
            .replace(' ', "_");
        let body = ErrorBody {
            error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
