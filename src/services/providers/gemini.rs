use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{Cache, CacheKey};
use crate::error::{AppError, AppResult};
use crate::services::providers::GenerativeProvider;

const VISION_MODEL: &str = "gemini-1.5-flash";
const CHAT_MODEL: &str = "gemini-1.5-flash";
/// Extraction results for the same image never change; cache for a day
const EXTRACTION_CACHE_TTL: u64 = 86400;

const EXTRACTION_PROMPT: &str = "Look at this image of a fridge or pantry and list all visible \
food ingredients. Format the response as a simple comma-separated list of ingredients. Be \
specific but concise (e.g., 'red onion' not just 'onion' if visible). Ignore non-food items \
and packaging.";

// Request/response shapes for the generateContent endpoint

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini-backed implementation of [`GenerativeProvider`].
///
/// Extraction results are cached by image digest: the same photo uploaded
/// twice costs one vision call. Cache failures degrade to a fresh call.
#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

impl GeminiProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            cache,
        }
    }

    async fn generate_content(&self, model: &str, parts: Vec<Part>) -> AppResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_url, model);
        let body = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gemini returned {}: {}",
                status, detail
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::ExternalApi(
                "Gemini returned an empty response".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait::async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn extract_ingredients(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> AppResult<Vec<String>> {
        let digest = format!("{:x}", Sha256::digest(image));
        let key = CacheKey::Extraction(digest);

        let cached: Option<Vec<String>> = match self.cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "Extraction cache lookup failed; calling provider");
                None
            }
        };
        if let Some(ingredients) = cached {
            tracing::debug!(count = ingredients.len(), "Extraction cache hit");
            return Ok(ingredients);
        }

        let parts = vec![
            Part::Text(EXTRACTION_PROMPT.to_string()),
            Part::InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(image),
            },
        ];
        let text = self.generate_content(VISION_MODEL, parts).await?;
        let ingredients = parse_ingredient_list(&text);

        self.cache
            .set_in_background(&key, &ingredients, EXTRACTION_CACHE_TTL);
        Ok(ingredients)
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.generate_content(CHAT_MODEL, vec![Part::Text(prompt.to_string())])
            .await
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Splits the model's comma-separated reply into cleaned ingredient names
pub fn parse_ingredient_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(clean_ingredient_name)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Strips quantities, units, and preparation prefixes from an ingredient
/// name so pantry comparison keys stay stable across phrasings.
pub fn clean_ingredient_name(name: &str) -> String {
    const UNITS: [&str; 7] = [
        "cup",
        "tablespoon",
        "teaspoon",
        "ounce",
        "pound",
        "gram",
        "kg",
    ];
    const PREFIXES: [&str; 4] = ["fresh", "frozen", "dried", "canned"];

    let mut cleaned = name.to_lowercase();
    for unit in UNITS {
        cleaned = cleaned.replace(&format!("{}s", unit), "").replace(unit, "");
    }

    let mut cleaned = cleaned.trim();
    for prefix in PREFIXES {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.trim_start();
        }
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingredient_list_splits_and_trims() {
        let ingredients = parse_ingredient_list("pasta, red onion ,garlic,, olive oil");
        assert_eq!(
            ingredients,
            vec!["pasta", "red onion", "garlic", "olive oil"]
        );
    }

    #[test]
    fn test_clean_strips_units() {
        assert_eq!(clean_ingredient_name("2 cups rice"), "2  rice");
        assert_eq!(clean_ingredient_name("butter"), "butter");
    }

    #[test]
    fn test_clean_strips_preparation_prefixes() {
        assert_eq!(clean_ingredient_name("fresh basil"), "basil");
        assert_eq!(clean_ingredient_name("Frozen peas"), "peas");
        assert_eq!(clean_ingredient_name("canned tomato"), "tomato");
    }

    #[test]
    fn test_parse_drops_empty_entries() {
        assert!(parse_ingredient_list(", ,").is_empty());
    }

    #[test]
    fn test_inline_data_serializes_snake_case() {
        let part = Part::InlineData {
            mime_type: "image/jpeg".to_string(),
            data: "aGk=".to_string(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inline_data"]["mime_type"], "image/jpeg");
    }
}
