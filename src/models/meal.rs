use serde::{Deserialize, Serialize};

/// Prep time assumed for meal records that omit it, in minutes.
///
/// These defaults are load-bearing: a malformed candidate record silently
/// scores against the defaulted value instead of being rejected.
pub const DEFAULT_PREP_TIME: u32 = 60;
/// Difficulty assumed for meal records that omit it (1-5 scale).
pub const DEFAULT_DIFFICULTY: u8 = 3;

/// A meal under consideration for recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateMeal {
    /// Unique identifier for the meal
    pub id: String,
    /// Display name (e.g., "Quick Pasta")
    pub name: String,
    /// Cuisine category tag (e.g., "italian")
    pub cuisine_type: String,
    /// Bandit arm index for this cuisine, in `[0, n_cuisines)`
    #[serde(default)]
    pub cuisine_id: usize,
    /// Preparation time in minutes
    #[serde(default = "default_prep_time")]
    pub prep_time: u32,
    /// Ingredients the recipe calls for
    #[serde(default)]
    pub required_ingredients: Vec<String>,
    /// Difficulty on a 1-5 scale
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// Dietary tags (e.g., "contains-gluten", "vegetarian")
    #[serde(default)]
    pub dietary_tags: Vec<String>,
}

fn default_prep_time() -> u32 {
    DEFAULT_PREP_TIME
}

fn default_difficulty() -> u8 {
    DEFAULT_DIFFICULTY
}

/// A candidate meal annotated by one ranking pass.
///
/// Built fresh from a [`CandidateMeal`] on every `rank` call; the input
/// candidates are never mutated and annotations carry no identity across
/// calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMeal {
    #[serde(flatten)]
    pub meal: CandidateMeal,
    /// Required ingredients not in the user's pantry (lowercased, sorted)
    pub missing_ingredients: Vec<String>,
    /// Whether the bandit picked this meal in this ranking pass
    pub rl_boost: bool,
    /// Final additive score
    pub score: f64,
}

impl ScoredMeal {
    /// Wraps a candidate that passed the ingredient filter
    pub fn annotated(meal: CandidateMeal, missing_ingredients: Vec<String>) -> Self {
        Self {
            meal,
            missing_ingredients,
            rl_boost: false,
            score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_take_defaults() {
        let meal: CandidateMeal = serde_json::from_value(json!({
            "id": "1",
            "name": "Mystery Stew",
            "cuisine_type": "american"
        }))
        .unwrap();

        assert_eq!(meal.prep_time, 60);
        assert_eq!(meal.difficulty, 3);
        assert_eq!(meal.cuisine_id, 0);
        assert!(meal.required_ingredients.is_empty());
        assert!(meal.dietary_tags.is_empty());
    }

    #[test]
    fn test_scored_meal_serializes_flat() {
        let meal = CandidateMeal {
            id: "1".to_string(),
            name: "Quick Pasta".to_string(),
            cuisine_type: "italian".to_string(),
            cuisine_id: 0,
            prep_time: 20,
            required_ingredients: vec!["pasta".to_string()],
            difficulty: 2,
            dietary_tags: vec![],
        };
        let scored = ScoredMeal::annotated(meal, vec![]);

        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["name"], "Quick Pasta");
        assert_eq!(value["rl_boost"], false);
        assert_eq!(value["score"], 0.0);
    }
}
