use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{MealStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::{SuggestRequest, SuggestResponse, UserState};
use crate::services::providers::GenerativeProvider;
use crate::services::selector::RecommendationEngine;

/// How many ranked meals the suggest endpoint returns
pub const MAX_SUGGESTIONS: usize = 5;
/// How many history rows feed the recent-cuisine window
const HISTORY_FETCH_LIMIT: u32 = 50;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Full suggestion flow: snapshot the user, resolve ingredients, rank.
pub async fn suggest_meals(
    pool: &SqlitePool,
    engine: &RecommendationEngine,
    provider: &dyn GenerativeProvider,
    request: SuggestRequest,
) -> AppResult<SuggestResponse> {
    let users = UserStore::new(pool);
    let profile = users
        .get_user(&request.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", request.user_id)))?;
    let preferences = users.get_user_preferences(&request.user_id).await?;
    let history = users
        .recent_history(&request.user_id, HISTORY_FETCH_LIMIT)
        .await?;
    let user_state = UserState::derive(&profile, &preferences, &history, request.mood, Utc::now());

    let ingredients = resolve_ingredients(provider, &request).await?;

    let candidates = MealStore::new(pool).candidate_meals().await?;
    let mut rng = rand::thread_rng();
    let ranked = engine.rank(&user_state, &ingredients, &candidates, &mut rng)?;

    tracing::debug!(
        user_id = %request.user_id,
        viable = ranked.len(),
        ingredients = ingredients.len(),
        "Ranked suggestion candidates"
    );

    Ok(SuggestResponse {
        meals: ranked.into_iter().take(MAX_SUGGESTIONS).collect(),
        ingredients_found: ingredients,
    })
}

/// Resolves the pantry from the request: an explicit list wins, otherwise
/// the image goes through the vision provider.
///
/// An extraction failure degrades to an empty pantry rather than failing
/// the request; only a request carrying neither source is rejected.
async fn resolve_ingredients(
    provider: &dyn GenerativeProvider,
    request: &SuggestRequest,
) -> AppResult<Vec<String>> {
    if let Some(ingredients) = &request.ingredients {
        return Ok(ingredients.clone());
    }

    let Some(encoded) = &request.image_base64 else {
        return Err(AppError::InvalidInput(
            "provide either ingredients or image_base64".to_string(),
        ));
    };

    let image = BASE64
        .decode(encoded)
        .map_err(|e| AppError::InvalidInput(format!("image_base64 is not valid base64: {}", e)))?;
    let mime_type = request
        .image_mime_type
        .as_deref()
        .unwrap_or(DEFAULT_IMAGE_MIME);

    match provider.extract_ingredients(&image, mime_type).await {
        Ok(ingredients) => Ok(ingredients),
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                error = %e,
                "Ingredient extraction failed; continuing with empty pantry"
            );
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait::async_trait]
    impl GenerativeProvider for FailingProvider {
        async fn extract_ingredients(
            &self,
            _image: &[u8],
            _mime_type: &str,
        ) -> AppResult<Vec<String>> {
            Err(AppError::ExternalApi("vision service down".to_string()))
        }

        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            Err(AppError::ExternalApi("text service down".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing-stub"
        }
    }

    fn request_with(
        ingredients: Option<Vec<String>>,
        image_base64: Option<String>,
    ) -> SuggestRequest {
        SuggestRequest {
            user_id: "u1".to_string(),
            mood: None,
            ingredients,
            image_base64,
            image_mime_type: None,
        }
    }

    #[tokio::test]
    async fn test_explicit_ingredients_skip_provider() {
        let request = request_with(Some(vec!["pasta".to_string()]), None);
        let ingredients = resolve_ingredients(&FailingProvider, &request)
            .await
            .unwrap();
        assert_eq!(ingredients, vec!["pasta".to_string()]);
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_to_empty() {
        let request = request_with(None, Some(BASE64.encode(b"not a real image")));
        let ingredients = resolve_ingredients(&FailingProvider, &request)
            .await
            .unwrap();
        assert!(ingredients.is_empty());
    }

    #[tokio::test]
    async fn test_missing_both_sources_is_rejected() {
        let request = request_with(None, None);
        assert!(matches!(
            resolve_ingredients(&FailingProvider, &request).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_base64_is_rejected() {
        let request = request_with(None, Some("!!not base64!!".to_string()));
        assert!(matches!(
            resolve_ingredients(&FailingProvider, &request).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
