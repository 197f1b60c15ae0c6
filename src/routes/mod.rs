use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};
use crate::services::{BanditAgent, GenerativeProvider, RecommendationEngine};

pub mod chat;
pub mod meals;
pub mod users;

/// Shared application state
pub struct AppState {
    pub pool: SqlitePool,
    pub bandit: Arc<BanditAgent>,
    pub engine: RecommendationEngine,
    pub provider: Arc<dyn GenerativeProvider>,
}

/// Creates the application router with all routes and layers
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/meals/suggest", post(meals::suggest))
        .route("/meals/feedback", post(meals::feedback))
        .route("/chat", post(chat::chat))
        .route("/users", post(users::create_user))
        .route("/users/:id/preferences", get(users::get_preferences))
        .route("/users/:id/preferences", put(users::update_preference))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
