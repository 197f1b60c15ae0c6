use serde::{Deserialize, Serialize};

pub mod meal;
pub mod user;

pub use meal::{CandidateMeal, ScoredMeal, DEFAULT_DIFFICULTY, DEFAULT_PREP_TIME};
pub use user::{
    MealHistoryEntry, Mood, UserProfile, UserState, PREF_CUISINE, PREF_DIETARY_RESTRICTION,
    RECENT_WINDOW_DAYS,
};

// ============================================================================
// Wire types
// ============================================================================

/// Request body for POST /api/v1/meals/suggest
///
/// Ingredients come either as an explicit list or as a base64-encoded photo
/// for the vision provider to inspect. At least one of the two must be set.
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub user_id: String,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub image_base64: Option<String>,
    /// MIME type for the uploaded image, defaults to image/jpeg
    #[serde(default)]
    pub image_mime_type: Option<String>,
}

/// Ranked suggestions plus the ingredient list that drove them
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub meals: Vec<ScoredMeal>,
    pub ingredients_found: Vec<String>,
}

/// Request body for POST /api/v1/meals/feedback
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub meal_id: String,
    /// +1 liked, -1 disliked; values outside [-1, 1] are clamped
    pub rating: i32,
    #[serde(default)]
    pub completed: bool,
}

/// Acknowledgement with the updated arm state
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub cuisine_id: usize,
    pub q_value: f64,
    pub n_selections: u64,
    /// Exploration probability after this update
    pub epsilon: f64,
}

/// Request body for POST /api/v1/chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Request body for POST /api/v1/users
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    #[serde(default = "default_cooking_skill")]
    pub cooking_skill: u8,
    #[serde(default = "default_max_prep_time")]
    pub max_prep_time: u32,
    #[serde(default = "default_household_size")]
    pub household_size: u32,
}

fn default_cooking_skill() -> u8 {
    1
}

fn default_max_prep_time() -> u32 {
    60
}

fn default_household_size() -> u32 {
    1
}

/// Request body for PUT /api/v1/users/:id/preferences
#[derive(Debug, Deserialize)]
pub struct PreferenceUpdateRequest {
    /// Preference row type, e.g. "cuisine" or "dietary_restriction"
    pub preference_type: String,
    pub value: String,
    #[serde(default = "default_liked")]
    pub liked: bool,
}

fn default_liked() -> bool {
    true
}
