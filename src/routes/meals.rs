use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::error::AppResult;
use crate::middleware::RequestId;
use crate::models::{FeedbackRequest, FeedbackResponse, SuggestRequest, SuggestResponse};
use crate::routes::AppState;
use crate::services::{feedback, suggestions};

/// Handler for the meal suggestion endpoint
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SuggestRequest>,
) -> AppResult<Json<SuggestResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        has_image = request.image_base64.is_some(),
        "Processing suggestion request"
    );

    let response = suggestions::suggest_meals(
        &state.pool,
        &state.engine,
        state.provider.as_ref(),
        request,
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        suggestions = response.meals.len(),
        "Suggestion request completed"
    );

    Ok(Json(response))
}

/// Handler for the meal feedback endpoint
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %request.user_id,
        meal_id = %request.meal_id,
        rating = request.rating,
        "Processing feedback request"
    );

    let response = feedback::record_feedback(&state.pool, &state.bandit, request).await?;
    Ok(Json(response))
}
