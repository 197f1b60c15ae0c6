use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::{CandidateMeal, MealHistoryEntry, UserProfile};
use crate::services::bandit::ArmState;

/// Creates a SQLite connection pool, creating the database file on first run
pub async fn create_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    cooking_skill_level INTEGER NOT NULL DEFAULT 1,
    max_prep_time INTEGER NOT NULL DEFAULT 60,
    household_size INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS user_preferences (
    user_id TEXT NOT NULL,
    preference_type TEXT NOT NULL,
    preference_value TEXT NOT NULL,
    is_liked INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (user_id, preference_type, preference_value)
);

CREATE TABLE IF NOT EXISTS meal_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    meal_id TEXT NOT NULL,
    cuisine_type TEXT NOT NULL DEFAULT '',
    rating INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meals (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    cuisine_type TEXT NOT NULL,
    cuisine_id INTEGER NOT NULL,
    prep_time INTEGER NOT NULL DEFAULT 60,
    required_ingredients TEXT NOT NULL DEFAULT '[]',
    difficulty INTEGER NOT NULL DEFAULT 3,
    dietary_tags TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS rl_state (
    cuisine_id INTEGER PRIMARY KEY,
    q_value REAL NOT NULL,
    n_selections INTEGER NOT NULL
);
";

/// Creates all tables if they do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// User profiles, preference rows, and meal history
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, (String, i64, i64, i64)>(
            "SELECT id, cooking_skill_level, max_prep_time, household_size
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, skill, prep, household)| UserProfile {
            id,
            cooking_skill: skill as u8,
            max_prep_time: prep as u32,
            household_size: household as u32,
        }))
    }

    pub async fn upsert_user(&self, profile: &UserProfile) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, cooking_skill_level, max_prep_time, household_size)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 cooking_skill_level = excluded.cooking_skill_level,
                 max_prep_time = excluded.max_prep_time,
                 household_size = excluded.household_size",
        )
        .bind(&profile.id)
        .bind(i64::from(profile.cooking_skill))
        .bind(i64::from(profile.max_prep_time))
        .bind(i64::from(profile.household_size))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_preference(
        &self,
        user_id: &str,
        preference_type: &str,
        value: &str,
        liked: bool,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO user_preferences
                 (user_id, preference_type, preference_value, is_liked)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(preference_type)
        .bind(value)
        .bind(liked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Liked preference values grouped by preference type
    pub async fn get_user_preferences(
        &self,
        user_id: &str,
    ) -> AppResult<HashMap<String, Vec<String>>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT preference_type, preference_value
             FROM user_preferences
             WHERE user_id = ? AND is_liked = 1
             ORDER BY preference_type, preference_value",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut preferences: HashMap<String, Vec<String>> = HashMap::new();
        for (pref_type, value) in rows {
            preferences.entry(pref_type).or_default().push(value);
        }
        Ok(preferences)
    }

    pub async fn save_meal_to_history(
        &self,
        user_id: &str,
        entry: &MealHistoryEntry,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO meal_history
                 (user_id, meal_id, cuisine_type, rating, completed, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&entry.meal_id)
        .bind(&entry.cuisine_type)
        .bind(i64::from(entry.rating))
        .bind(entry.completed)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent history entries, newest first. Rows with a timestamp
    /// that no longer parses are skipped with a warning.
    pub async fn recent_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<MealHistoryEntry>> {
        let rows = sqlx::query_as::<_, (String, String, i64, bool, String)>(
            "SELECT meal_id, cuisine_type, rating, completed, timestamp
             FROM meal_history
             WHERE user_id = ?
             ORDER BY timestamp DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (meal_id, cuisine_type, rating, completed, timestamp) in rows {
            match DateTime::parse_from_rfc3339(&timestamp) {
                Ok(parsed) => entries.push(MealHistoryEntry {
                    meal_id,
                    cuisine_type,
                    rating: rating as i32,
                    completed,
                    timestamp: parsed.with_timezone(&Utc),
                }),
                Err(e) => {
                    tracing::warn!(meal_id = %meal_id, error = %e, "Skipping history row with bad timestamp");
                }
            }
        }
        Ok(entries)
    }
}

/// Candidate meal catalog
pub struct MealStore {
    pool: SqlitePool,
}

type MealRow = (String, String, String, i64, i64, String, i64, String);

impl MealStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn candidate_meals(&self) -> AppResult<Vec<CandidateMeal>> {
        let rows = sqlx::query_as::<_, MealRow>(
            "SELECT id, name, cuisine_type, cuisine_id, prep_time,
                    required_ingredients, difficulty, dietary_tags
             FROM meals ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::meal_from_row).collect())
    }

    pub async fn get_meal(&self, meal_id: &str) -> AppResult<Option<CandidateMeal>> {
        let row = sqlx::query_as::<_, MealRow>(
            "SELECT id, name, cuisine_type, cuisine_id, prep_time,
                    required_ingredients, difficulty, dietary_tags
             FROM meals WHERE id = ?",
        )
        .bind(meal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::meal_from_row))
    }

    pub async fn insert_meal(&self, meal: &CandidateMeal) -> AppResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO meals
                 (id, name, cuisine_type, cuisine_id, prep_time,
                  required_ingredients, difficulty, dietary_tags)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&meal.id)
        .bind(&meal.name)
        .bind(&meal.cuisine_type)
        .bind(meal.cuisine_id as i64)
        .bind(i64::from(meal.prep_time))
        .bind(json_list(&meal.required_ingredients))
        .bind(i64::from(meal.difficulty))
        .bind(json_list(&meal.dietary_tags))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts the starter meal catalog when the table is empty
    pub async fn seed_if_empty(&self) -> AppResult<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM meals")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        tracing::info!("Seeding starter meal catalog");
        for meal in seed_meals() {
            self.insert_meal(&meal).await?;
        }
        Ok(())
    }

    fn meal_from_row(row: MealRow) -> CandidateMeal {
        let (id, name, cuisine_type, cuisine_id, prep_time, ingredients, difficulty, tags) = row;
        CandidateMeal {
            id,
            name,
            cuisine_type,
            cuisine_id: cuisine_id as usize,
            prep_time: prep_time as u32,
            required_ingredients: parse_json_list(&ingredients),
            difficulty: difficulty as u8,
            dietary_tags: parse_json_list(&tags),
        }
    }
}

/// Bandit learner state, one row per cuisine arm
pub struct ArmStore {
    pool: SqlitePool,
}

impl ArmStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn load_all_arms(&self) -> AppResult<Vec<(usize, f64, u64)>> {
        let rows = sqlx::query_as::<_, (i64, f64, i64)>(
            "SELECT cuisine_id, q_value, n_selections FROM rl_state",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cuisine_id, q_value, n_selections)| {
                (cuisine_id as usize, q_value, n_selections as u64)
            })
            .collect())
    }

    pub async fn save_arm(&self, cuisine_id: usize, arm: &ArmState) -> AppResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO rl_state (cuisine_id, q_value, n_selections)
             VALUES (?, ?, ?)",
        )
        .bind(cuisine_id as i64)
        .bind(arm.q_value)
        .bind(arm.n_selections as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn parse_json_list(raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unparseable ingredient list column");
            Vec::new()
        }
    }
}

fn seed_meals() -> Vec<CandidateMeal> {
    fn meal(
        id: &str,
        name: &str,
        cuisine_type: &str,
        cuisine_id: usize,
        prep_time: u32,
        ingredients: &[&str],
        difficulty: u8,
        tags: &[&str],
    ) -> CandidateMeal {
        CandidateMeal {
            id: id.to_string(),
            name: name.to_string(),
            cuisine_type: cuisine_type.to_string(),
            cuisine_id,
            prep_time,
            required_ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            difficulty,
            dietary_tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    vec![
        meal(
            "1",
            "Quick Pasta",
            "italian",
            0,
            20,
            &["pasta", "tomato", "garlic"],
            2,
            &["contains-gluten"],
        ),
        meal(
            "2",
            "Chicken Tacos",
            "mexican",
            1,
            25,
            &["tortilla", "chicken", "onion", "lime"],
            2,
            &["contains-gluten"],
        ),
        meal(
            "3",
            "Veggie Stir Fry",
            "chinese",
            2,
            25,
            &["rice", "broccoli", "soy sauce", "carrot"],
            2,
            &["vegetarian"],
        ),
        meal(
            "4",
            "Chana Masala",
            "indian",
            3,
            40,
            &["chickpeas", "tomato", "onion", "garam masala"],
            3,
            &["vegetarian", "vegan"],
        ),
        meal(
            "5",
            "Teriyaki Salmon",
            "japanese",
            4,
            30,
            &["salmon", "soy sauce", "rice", "ginger"],
            3,
            &["contains-fish"],
        ),
        meal(
            "6",
            "Classic Burger",
            "american",
            5,
            35,
            &["ground beef", "bun", "lettuce", "cheese"],
            2,
            &["contains-gluten", "contains-dairy"],
        ),
        meal(
            "7",
            "Mushroom Omelette",
            "french",
            6,
            15,
            &["eggs", "mushroom", "butter"],
            1,
            &["vegetarian", "contains-eggs"],
        ),
        meal(
            "8",
            "Greek Salad",
            "greek",
            7,
            10,
            &["cucumber", "tomato", "feta", "olive oil"],
            1,
            &["vegetarian"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory db
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_user_roundtrip() {
        let pool = test_pool().await;
        let store = UserStore::new(&pool);

        assert!(store.get_user("u1").await.unwrap().is_none());

        let profile = UserProfile {
            id: "u1".to_string(),
            cooking_skill: 4,
            max_prep_time: 45,
            household_size: 3,
        };
        store.upsert_user(&profile).await.unwrap();

        let loaded = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded, profile);
    }

    #[tokio::test]
    async fn test_preferences_grouped_by_type() {
        let pool = test_pool().await;
        let store = UserStore::new(&pool);

        store
            .upsert_preference("u1", "cuisine", "italian", true)
            .await
            .unwrap();
        store
            .upsert_preference("u1", "cuisine", "japanese", true)
            .await
            .unwrap();
        store
            .upsert_preference("u1", "cuisine", "mexican", false)
            .await
            .unwrap();
        store
            .upsert_preference("u1", "dietary_restriction", "contains-nuts", true)
            .await
            .unwrap();

        let preferences = store.get_user_preferences("u1").await.unwrap();
        assert_eq!(
            preferences["cuisine"],
            vec!["italian".to_string(), "japanese".to_string()]
        );
        assert_eq!(
            preferences["dietary_restriction"],
            vec!["contains-nuts".to_string()]
        );
    }

    #[tokio::test]
    async fn test_history_roundtrip_newest_first() {
        let pool = test_pool().await;
        let store = UserStore::new(&pool);

        let older = MealHistoryEntry {
            meal_id: "1".to_string(),
            cuisine_type: "italian".to_string(),
            rating: 1,
            completed: true,
            timestamp: Utc::now() - Duration::days(2),
        };
        let newer = MealHistoryEntry {
            meal_id: "3".to_string(),
            cuisine_type: "chinese".to_string(),
            rating: -1,
            completed: false,
            timestamp: Utc::now(),
        };
        store.save_meal_to_history("u1", &older).await.unwrap();
        store.save_meal_to_history("u1", &newer).await.unwrap();

        let history = store.recent_history("u1", 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].meal_id, "3");
        assert_eq!(history[1].meal_id, "1");
        assert_eq!(history[1].rating, 1);
    }

    #[tokio::test]
    async fn test_seed_and_lookup_meals() {
        let pool = test_pool().await;
        let store = MealStore::new(&pool);

        store.seed_if_empty().await.unwrap();
        let meals = store.candidate_meals().await.unwrap();
        assert!(!meals.is_empty());

        // Seeding again must not duplicate
        store.seed_if_empty().await.unwrap();
        assert_eq!(store.candidate_meals().await.unwrap().len(), meals.len());

        let pasta = store.get_meal("1").await.unwrap().unwrap();
        assert_eq!(pasta.name, "Quick Pasta");
        assert_eq!(pasta.cuisine_type, "italian");
        assert_eq!(
            pasta.required_ingredients,
            vec!["pasta".to_string(), "tomato".to_string(), "garlic".to_string()]
        );
    }

    #[tokio::test]
    async fn test_arm_store_roundtrip() {
        let pool = test_pool().await;
        let store = ArmStore::new(&pool);

        assert!(store.load_all_arms().await.unwrap().is_empty());

        store
            .save_arm(
                2,
                &ArmState {
                    q_value: 0.19,
                    n_selections: 2,
                },
            )
            .await
            .unwrap();
        store
            .save_arm(
                2,
                &ArmState {
                    q_value: 0.271,
                    n_selections: 3,
                },
            )
            .await
            .unwrap();

        let arms = store.load_all_arms().await.unwrap();
        assert_eq!(arms, vec![(2, 0.271, 3)]);
    }
}
