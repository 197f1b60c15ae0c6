use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use rand::Rng;

use crate::error::AppResult;
use crate::models::{CandidateMeal, ScoredMeal, Mood, UserState};
use crate::services::bandit::BanditAgent;

/// Additive weights for the scoring table. None of the contributions is
/// exclusive with another; a meal can collect all of them.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    /// Applied to the single bandit-chosen candidate
    pub bandit_boost: f64,
    /// Prep time fits the user's time budget
    pub time_fit: f64,
    /// Difficulty at or below the user's skill
    pub skill_fit: f64,
    /// No dietary tag collides with the user's restrictions
    pub diet_safe: f64,
    /// Cuisine is among the user's liked cuisines
    pub liked_cuisine: f64,
    /// Tired user, quick meal
    pub tired_quick: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bandit_boost: 2.0,
            time_fit: 1.0,
            skill_fit: 0.5,
            diet_safe: 1.0,
            liked_cuisine: 1.5,
            tired_quick: 1.0,
        }
    }
}

/// Knobs for the filter/score pipeline
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// A candidate survives the filter iff it is missing at most this many
    /// required ingredients.
    pub max_missing_ingredients: usize,
    /// A meal faster than this counts as quick for the tired-mood bonus.
    pub quick_meal_minutes: u32,
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_missing_ingredients: 2,
            quick_meal_minutes: 30,
            weights: ScoringWeights::default(),
        }
    }
}

/// Turns a raw candidate list into a ranked, annotated suggestion list.
///
/// Never mutates its inputs: candidates are copied into [`ScoredMeal`]
/// records, so concurrent ranking calls cannot alias.
pub struct RecommendationEngine {
    bandit: Arc<BanditAgent>,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(bandit: Arc<BanditAgent>, config: EngineConfig) -> Self {
        Self { bandit, config }
    }

    /// Keeps the candidates whose required ingredients are (nearly) covered
    /// by the pantry, annotating each survivor with what it is missing.
    ///
    /// Comparison is case-insensitive; output preserves input order. Note
    /// the deliberate near-miss tolerance: with an empty pantry, any meal
    /// needing at most `max_missing_ingredients` ingredients still passes.
    pub fn filter_by_ingredients(
        &self,
        candidates: &[CandidateMeal],
        available: &[String],
    ) -> Vec<ScoredMeal> {
        let pantry: HashSet<String> = available
            .iter()
            .map(|ingredient| ingredient.trim().to_lowercase())
            .collect();

        candidates
            .iter()
            .filter_map(|meal| {
                let missing: BTreeSet<String> = meal
                    .required_ingredients
                    .iter()
                    .map(|ingredient| ingredient.trim().to_lowercase())
                    .filter(|ingredient| !pantry.contains(ingredient))
                    .collect();

                if missing.len() > self.config.max_missing_ingredients {
                    return None;
                }
                Some(ScoredMeal::annotated(
                    meal.clone(),
                    missing.into_iter().collect(),
                ))
            })
            .collect()
    }

    /// Filter, bandit-boost, score, sort.
    ///
    /// Exactly one viable candidate receives the boost (none when the
    /// viable set is empty). The sort is descending by score and stable,
    /// so equal scores keep their input order. Empty inputs yield an
    /// empty list, never an error.
    pub fn rank<R: Rng>(
        &self,
        user: &UserState,
        available: &[String],
        candidates: &[CandidateMeal],
        rng: &mut R,
    ) -> AppResult<Vec<ScoredMeal>> {
        let mut viable = self.filter_by_ingredients(candidates, available);

        if !viable.is_empty() {
            let chosen = self.bandit.choose(user, &viable, rng)?;
            viable[chosen].rl_boost = true;
        }

        for meal in &mut viable {
            meal.score = self.score(meal, user);
        }

        viable.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(viable)
    }

    fn score(&self, meal: &ScoredMeal, user: &UserState) -> f64 {
        let weights = &self.config.weights;
        let mut score = 0.0;

        if meal.rl_boost {
            score += weights.bandit_boost;
        }
        if meal.meal.prep_time <= user.time_available {
            score += weights.time_fit;
        }
        if meal.meal.difficulty <= user.cooking_skill {
            score += weights.skill_fit;
        }
        let diet_conflict = meal
            .meal
            .dietary_tags
            .iter()
            .any(|tag| user.dietary_restrictions.contains(tag));
        if !diet_conflict {
            score += weights.diet_safe;
        }
        if user.liked_cuisines.contains(&meal.meal.cuisine_type) {
            score += weights.liked_cuisine;
        }
        if user.mood == Some(Mood::Tired) && meal.meal.prep_time < self.config.quick_meal_minutes {
            score += weights.tired_quick;
        }

        score
    }
}
