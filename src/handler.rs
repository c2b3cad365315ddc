use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::HealthResponse;
use crate::error::ServiceError;
use crate::service::{LikeService, parse_body};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LikeService>,
}

impl AppState {
    pub fn new(service: LikeService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}

fn respond<T: Serialize>(action: &str, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => crate::good_response(body),
        Err(e @ ServiceError::InvalidRequest(_)) => {
            tracing::info!(action, error = %crate::unpack_error(&e), "rejected request");
            e.into_response()
        }
        Err(e) => {
            tracing::error!(action, error = %crate::unpack_error(&e), "request failed");
            e.into_response()
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    tracing::info!("got healthcheck request");
    Json(HealthResponse::new_from_msg("ok"))
}

pub async fn like(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match parse_body(&body) {
        Ok(payload) => state.service.like(&payload).await,
        Err(e) => Err(e),
    };
    respond("like", result)
}

pub async fn unlike(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match parse_body(&body) {
        Ok(payload) => state.service.unlike(&payload).await,
        Err(e) => Err(e),
    };
    respond("unlike", result)
}

pub async fn list(State(state): State<AppState>) -> Response {
    respond("list", state.service.list().await)
}
