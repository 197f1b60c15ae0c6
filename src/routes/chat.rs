use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::error::AppResult;
use crate::middleware::RequestId;
use crate::models::{ChatRequest, ChatResponse};
use crate::routes::AppState;
use crate::services::chat as chat_service;

/// Handler for the conversational cooking-assistant endpoint
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    tracing::info!(
        request_id = %request_id,
        provider = state.provider.name(),
        "Processing chat request"
    );

    let response = chat_service::chat_reply(&state.pool, state.provider.as_ref(), request).await?;
    Ok(Json(response))
}
