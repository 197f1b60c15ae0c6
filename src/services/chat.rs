use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::UserStore;
use crate::error::AppResult;
use crate::models::{ChatRequest, ChatResponse, Mood, UserState};
use crate::services::providers::GenerativeProvider;

const HISTORY_FETCH_LIMIT: u32 = 50;

/// Builds the context-aware cooking-assistant prompt
pub fn build_prompt(query: &str, user_state: &UserState, ingredients: &[String]) -> String {
    let mood = match user_state.mood {
        Some(Mood::Tired) => "tired",
        Some(Mood::Happy) => "happy",
        Some(Mood::Stressed) => "stressed",
        Some(Mood::Adventurous) => "adventurous",
        Some(Mood::Neutral) | None => "neutral",
    };

    format!(
        "As a helpful cooking assistant, help the user who is feeling {mood} and has {time} \
minutes available to cook. They have a cooking skill level of {skill}/5. Available \
ingredients: {ingredients}.\n\nTheir question is: {query}\n\nConsider their mood, time \
constraints, and skill level in your response. If suggesting a recipe, ensure it's achievable \
within their time limit and skill level.\n\nFormat your response in a friendly, conversational \
way, but be concise and practical.",
        mood = mood,
        time = user_state.time_available,
        skill = user_state.cooking_skill,
        ingredients = ingredients.join(", "),
        query = query,
    )
}

/// Answers a free-text cooking question with the user's context folded in.
///
/// Unknown or anonymous users get a default snapshot; the chat surface is
/// glue around [`UserState`], not part of the decision core.
pub async fn chat_reply(
    pool: &SqlitePool,
    provider: &dyn GenerativeProvider,
    request: ChatRequest,
) -> AppResult<ChatResponse> {
    let user_state = match &request.user_id {
        Some(user_id) => {
            let users = UserStore::new(pool);
            match users.get_user(user_id).await? {
                Some(profile) => {
                    let preferences = users.get_user_preferences(user_id).await?;
                    let history = users.recent_history(user_id, HISTORY_FETCH_LIMIT).await?;
                    UserState::derive(&profile, &preferences, &history, request.mood, Utc::now())
                }
                None => UserState {
                    mood: request.mood,
                    ..UserState::default()
                },
            }
        }
        None => UserState {
            mood: request.mood,
            ..UserState::default()
        },
    };

    let prompt = build_prompt(&request.query, &user_state, &request.ingredients);
    let reply = provider.generate(&prompt).await?;

    Ok(ChatResponse { reply })
}
