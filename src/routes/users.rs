use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::{CreateUserRequest, PreferenceUpdateRequest, UserProfile};
use crate::routes::AppState;

/// Creates (or updates) a user profile
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
    }
    if !(1..=5).contains(&request.cooking_skill) {
        return Err(AppError::InvalidInput(
            "cooking_skill must be between 1 and 5".to_string(),
        ));
    }

    let profile = UserProfile {
        id: request.user_id,
        cooking_skill: request.cooking_skill,
        max_prep_time: request.max_prep_time,
        household_size: request.household_size,
    };
    UserStore::new(&state.pool).upsert_user(&profile).await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Liked preference values grouped by type
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<HashMap<String, Vec<String>>>> {
    let store = UserStore::new(&state.pool);
    if store.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }

    let preferences = store.get_user_preferences(&user_id).await?;
    Ok(Json(preferences))
}

/// Records one preference row for a user
pub async fn update_preference(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<PreferenceUpdateRequest>,
) -> AppResult<StatusCode> {
    let store = UserStore::new(&state.pool);
    if store.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }

    store
        .upsert_preference(
            &user_id,
            &request.preference_type,
            &request.value,
            request.liked,
        )
        .await?;

    Ok(StatusCode::OK)
}
