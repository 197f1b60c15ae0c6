use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Trailing window over meal history used for `recent_cuisines`
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Preference row type for liked cuisines
pub const PREF_CUISINE: &str = "cuisine";
/// Preference row type for dietary restrictions
pub const PREF_DIETARY_RESTRICTION: &str = "dietary_restriction";

/// A user's mood signal, supplied per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Tired,
    Neutral,
    Happy,
    Stressed,
    Adventurous,
}

/// Stored user profile record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    /// Cooking skill on a 1-5 scale
    pub cooking_skill: u8,
    /// Time budget for cooking, minutes
    pub max_prep_time: u32,
    pub household_size: u32,
}

/// One meal-history record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealHistoryEntry {
    pub meal_id: String,
    pub cuisine_type: String,
    /// +1 liked, -1 disliked
    pub rating: i32,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time snapshot of a user's preferences and context.
///
/// Derived, never mutated in place; a fresh snapshot is built from the
/// stored profile, preference rows, and meal history on every request.
#[derive(Debug, Clone, Serialize)]
pub struct UserState {
    /// Minutes the user has available to cook
    pub time_available: u32,
    pub liked_cuisines: HashSet<String>,
    pub cooking_skill: u8,
    pub dietary_restrictions: HashSet<String>,
    /// Cuisines consumed within the trailing window, most recent first
    pub recent_cuisines: Vec<String>,
    pub household_size: u32,
    pub mood: Option<Mood>,
}

impl UserState {
    /// Builds a snapshot from the stored records, overlaying `mood` if
    /// the caller supplied one.
    ///
    /// Pure function of its inputs; history entries older than
    /// [`RECENT_WINDOW_DAYS`] relative to `now` are dropped.
    pub fn derive(
        profile: &UserProfile,
        preferences: &HashMap<String, Vec<String>>,
        history: &[MealHistoryEntry],
        mood: Option<Mood>,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
        let recent_cuisines = history
            .iter()
            .filter(|entry| entry.timestamp > cutoff)
            .map(|entry| entry.cuisine_type.clone())
            .collect();

        Self {
            time_available: profile.max_prep_time,
            liked_cuisines: collect_preference(preferences, PREF_CUISINE),
            cooking_skill: profile.cooking_skill,
            dietary_restrictions: collect_preference(preferences, PREF_DIETARY_RESTRICTION),
            recent_cuisines,
            household_size: profile.household_size,
            mood,
        }
    }
}

impl Default for UserState {
    /// Snapshot for an unknown or anonymous user
    fn default() -> Self {
        Self {
            time_available: 60,
            liked_cuisines: HashSet::new(),
            cooking_skill: 1,
            dietary_restrictions: HashSet::new(),
            recent_cuisines: Vec::new(),
            household_size: 1,
            mood: None,
        }
    }
}

fn collect_preference(
    preferences: &HashMap<String, Vec<String>>,
    pref_type: &str,
) -> HashSet<String> {
    preferences
        .get(pref_type)
        .map(|values| values.iter().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            cooking_skill: 3,
            max_prep_time: 45,
            household_size: 2,
        }
    }

    fn history_entry(cuisine: &str, days_ago: i64) -> MealHistoryEntry {
        MealHistoryEntry {
            meal_id: "m1".to_string(),
            cuisine_type: cuisine.to_string(),
            rating: 1,
            completed: true,
            timestamp: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_derive_copies_profile_fields() {
        let state = UserState::derive(&test_profile(), &HashMap::new(), &[], None, Utc::now());
        assert_eq!(state.time_available, 45);
        assert_eq!(state.cooking_skill, 3);
        assert_eq!(state.household_size, 2);
        assert_eq!(state.mood, None);
    }

    #[test]
    fn test_derive_filters_history_by_window() {
        let history = vec![
            history_entry("italian", 1),
            history_entry("mexican", 6),
            history_entry("chinese", 10),
        ];
        let state = UserState::derive(&test_profile(), &HashMap::new(), &history, None, Utc::now());
        assert_eq!(state.recent_cuisines, vec!["italian", "mexican"]);
    }

    #[test]
    fn test_derive_overlays_mood() {
        let state = UserState::derive(
            &test_profile(),
            &HashMap::new(),
            &[],
            Some(Mood::Tired),
            Utc::now(),
        );
        assert_eq!(state.mood, Some(Mood::Tired));
    }

    #[test]
    fn test_derive_splits_preference_types() {
        let mut preferences = HashMap::new();
        preferences.insert(
            PREF_CUISINE.to_string(),
            vec!["italian".to_string(), "japanese".to_string()],
        );
        preferences.insert(
            PREF_DIETARY_RESTRICTION.to_string(),
            vec!["contains-nuts".to_string()],
        );

        let state = UserState::derive(&test_profile(), &preferences, &[], None, Utc::now());
        assert!(state.liked_cuisines.contains("italian"));
        assert!(state.liked_cuisines.contains("japanese"));
        assert!(state.dietary_restrictions.contains("contains-nuts"));
        assert!(!state.liked_cuisines.contains("contains-nuts"));
    }

    #[test]
    fn test_mood_deserializes_lowercase() {
        let mood: Mood = serde_json::from_str("\"tired\"").unwrap();
        assert_eq!(mood, Mood::Tired);
    }
}
