//! API key authentication middleware
//!
//! Keys are passed via the `X-API-Key` header.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AuthConfig;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Clone)]
pub struct AuthState {
    config: AuthConfig,
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingKey,
    InvalidKey,
}

#[derive(Serialize)]
struct AuthError {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            AuthRejection::MissingKey => "Missing X-API-Key header",
            AuthRejection::InvalidKey => "Invalid API key",
        };
        let body = AuthError {
            error: "unauthorized",
            message,
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Decide whether a request for `path` carrying `key` may proceed
    pub fn check(&self, path: &str, key: Option<&str>) -> Result<(), AuthRejection> {
        if !self.config.enabled || self.is_excluded_path(path) {
            return Ok(());
        }
        match key {
            None => Err(AuthRejection::MissingKey),
            Some(key) if self.config.api_keys.iter().any(|k| k == key) => Ok(()),
            Some(_) => Err(AuthRejection::InvalidKey),
        }
    }

    fn is_excluded_path(&self, path: &str) -> bool {
        self.config
            .exclude_paths
            .iter()
            .any(|p| match p.strip_suffix('*') {
                Some(prefix) => path.starts_with(prefix),
                None => path == p,
            })
    }
}

pub async fn api_key_auth(
    State(auth_state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match auth_state.check(request.uri().path(), key) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::debug!("Rejected {}: {:?}", request.uri().path(), rejection);
            rejection.into_response()
        }
    }
}
