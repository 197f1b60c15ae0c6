use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{ArmStore, MealStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::{FeedbackRequest, FeedbackResponse, MealHistoryEntry};
use crate::services::bandit::BanditAgent;

/// Applies an observed outcome: bandit update, write-through arm
/// persistence, and a meal-history row.
///
/// The in-memory update happens first; a failed persistence write surfaces
/// as an error but leaves the agent's state valid, so the learner never
/// ends up torn between memory and store.
pub async fn record_feedback(
    pool: &SqlitePool,
    bandit: &BanditAgent,
    request: FeedbackRequest,
) -> AppResult<FeedbackResponse> {
    let users = UserStore::new(pool);
    if users.get_user(&request.user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {}", request.user_id)));
    }

    let meal = MealStore::new(pool)
        .get_meal(&request.meal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("meal {}", request.meal_id)))?;

    // Rewards are conventionally +1 liked / -1 disliked; anything wilder
    // from the wire gets clamped into that range.
    let reward = f64::from(request.rating).clamp(-1.0, 1.0);
    let arm = bandit.update(meal.cuisine_id, reward)?;
    ArmStore::new(pool).save_arm(meal.cuisine_id, &arm).await?;

    users
        .save_meal_to_history(
            &request.user_id,
            &MealHistoryEntry {
                meal_id: meal.id.clone(),
                cuisine_type: meal.cuisine_type.clone(),
                rating: request.rating,
                completed: request.completed,
                timestamp: Utc::now(),
            },
        )
        .await?;

    tracing::info!(
        user_id = %request.user_id,
        meal_id = %meal.id,
        cuisine_id = meal.cuisine_id,
        q_value = arm.q_value,
        "Recorded meal feedback"
    );

    Ok(FeedbackResponse {
        cuisine_id: meal.cuisine_id,
        q_value: arm.q_value,
        n_selections: arm.n_selections,
        epsilon: bandit.epsilon(),
    })
}
