use crate::handler::AppState;
use axum::{
    Json, Router,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::error::Error;
use tower_http::cors::{Any, CorsLayer};

pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod service;
pub mod store;

pub fn server_error<T: Serialize>(body: T) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

pub fn bad_request<T: Serialize>(body: T) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub fn good_response<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn unpack_error(err: &dyn Error) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handler::healthcheck))
        .route("/mods", get(handler::list))
        .route("/mods/like", post(handler::like))
        .route("/mods/unlike", post(handler::unlike))
        .layer(cors)
        .with_state(state)
}
