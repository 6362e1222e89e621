use axum::{extract::State, http::StatusCode, Json};
use mindqueue::{dispatch, tool_definitions, ErrorKind, ToolCall};
use serde_json::Value;
use std::sync::Arc;

use crate::models::{HealthResponse, ToolsResponse};
use crate::state::AppState;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_tools() -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: tool_definitions(),
    })
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(call): Json<ToolCall>,
) -> (StatusCode, Json<Value>) {
    let response = dispatch(&state.assistant, call).await;
    let status = match response.error_kind {
        None => StatusCode::OK,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::InvalidArgument) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::StorageIo) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(response.body))
}
