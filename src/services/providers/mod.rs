use crate::error::AppResult;

pub mod gemini;

pub use gemini::GeminiProvider;

/// External generative-model collaborator.
///
/// Covers both glue uses of the model: reading an ingredient list out of a
/// fridge photo, and producing conversational cooking advice. Behind a
/// trait so tests can substitute a stub and the vendor can be swapped
/// without touching the decision core.
#[async_trait::async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Lists the food ingredients visible in an image.
    ///
    /// Callers on the recommendation path must treat an `Err` as "no
    /// ingredients found" rather than failing the request.
    async fn extract_ingredients(&self, image: &[u8], mime_type: &str)
        -> AppResult<Vec<String>>;

    /// Generates prose for a prepared prompt
    async fn generate(&self, prompt: &str) -> AppResult<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
