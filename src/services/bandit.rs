use std::sync::RwLock;

use rand::Rng;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{ScoredMeal, UserState};

/// Penalty applied during exploitation when a candidate's prep time
/// exceeds the user's time budget.
const TIME_OVER_BUDGET_PENALTY: f64 = -0.5;
/// Bonus applied during exploitation when a candidate's cuisine is among
/// the user's liked cuisines.
const LIKED_CUISINE_BONUS: f64 = 0.3;

/// Learned state for one cuisine arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmState {
    /// Running estimate of expected reward, bounded by the rewards seen
    pub q_value: f64,
    /// Times this arm received an explicit reward update
    pub n_selections: u64,
}

impl ArmState {
    const ZERO: ArmState = ArmState {
        q_value: 0.0,
        n_selections: 0,
    };
}

/// Epsilon-greedy multi-armed bandit over a fixed set of cuisine arms.
///
/// Exploration probability decays as `1 / (1 + total_selections)`, so a
/// fresh agent always explores and a well-fed one almost always exploits.
///
/// All arm state sits behind a single lock: the arm count is small enough
/// that per-arm locking buys nothing. `choose` takes a read lock, `update`
/// a write lock, and [`snapshot`](Self::snapshot) clones under a scoped
/// read so persistence never holds the lock across I/O.
pub struct BanditAgent {
    n_cuisines: usize,
    learning_rate: f64,
    arms: RwLock<Vec<ArmState>>,
}

impl BanditAgent {
    /// Creates an agent with all arms at zero.
    ///
    /// `learning_rate` must lie in (0, 1].
    pub fn new(n_cuisines: usize, learning_rate: f64) -> AppResult<Self> {
        if n_cuisines == 0 {
            return Err(AppError::InvalidInput(
                "bandit needs at least one cuisine arm".to_string(),
            ));
        }
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(AppError::InvalidInput(format!(
                "learning rate {} outside (0, 1]",
                learning_rate
            )));
        }
        Ok(Self {
            n_cuisines,
            learning_rate,
            arms: RwLock::new(vec![ArmState::ZERO; n_cuisines]),
        })
    }

    /// Rebuilds an agent from persisted `(cuisine_id, q_value, n_selections)`
    /// rows. Rows referencing arms beyond `n_cuisines` are skipped with a
    /// warning, so shrinking the arm count does not brick startup.
    pub fn from_snapshot(
        n_cuisines: usize,
        learning_rate: f64,
        rows: &[(usize, f64, u64)],
    ) -> AppResult<Self> {
        let agent = Self::new(n_cuisines, learning_rate)?;
        {
            let mut arms = agent.write_arms()?;
            for &(cuisine_id, q_value, n_selections) in rows {
                match arms.get_mut(cuisine_id) {
                    Some(arm) => {
                        *arm = ArmState {
                            q_value,
                            n_selections,
                        };
                    }
                    None => {
                        tracing::warn!(
                            cuisine_id,
                            n_cuisines,
                            "Skipping persisted arm outside configured range"
                        );
                    }
                }
            }
        }
        Ok(agent)
    }

    pub fn n_cuisines(&self) -> usize {
        self.n_cuisines
    }

    /// Current exploration probability: `1 / (1 + total_selections)`
    pub fn epsilon(&self) -> f64 {
        self.arms
            .read()
            .map(|arms| Self::epsilon_of(&arms))
            .unwrap_or(1.0)
    }

    /// Picks the index of the candidate to favor in this ranking pass.
    ///
    /// With probability epsilon this is a uniform draw over `candidates`;
    /// otherwise it is a stable argmax of
    /// `q_value[cuisine] + time penalty + liked-cuisine bonus`.
    ///
    /// A candidate with a cuisine id outside `[0, n_cuisines)` is rejected
    /// with `InvalidInput` rather than clamped: a bad id means the meal
    /// table and the arm count disagree, which is worth failing loudly on.
    ///
    /// Pure read of arm state plus one random draw; no mutation, no I/O.
    pub fn choose<R: Rng>(
        &self,
        user: &UserState,
        candidates: &[ScoredMeal],
        rng: &mut R,
    ) -> AppResult<usize> {
        if candidates.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot choose from an empty candidate list".to_string(),
            ));
        }
        for candidate in candidates {
            self.check_arm(candidate.meal.cuisine_id)?;
        }

        let arms = self.read_arms()?;
        let epsilon = Self::epsilon_of(&arms);

        if rng.gen::<f64>() < epsilon {
            return Ok(rng.gen_range(0..candidates.len()));
        }

        Ok(Self::exploit(&arms, user, candidates))
    }

    /// Nudges the arm's value estimate toward `reward` and bumps its
    /// selection count. Returns the new arm state so the caller can
    /// write it through to the learner-state store.
    pub fn update(&self, cuisine_id: usize, reward: f64) -> AppResult<ArmState> {
        self.check_arm(cuisine_id)?;

        let mut arms = self.write_arms()?;
        let arm = &mut arms[cuisine_id];
        arm.n_selections += 1;
        arm.q_value += self.learning_rate * (reward - arm.q_value);
        Ok(*arm)
    }

    /// Clones all arm state under a scoped read lock
    pub fn snapshot(&self) -> AppResult<Vec<(usize, ArmState)>> {
        let arms = self.read_arms()?;
        Ok(arms.iter().copied().enumerate().collect())
    }

    /// Stable argmax over adjusted values; ties keep the first candidate
    /// in input order.
    fn exploit(arms: &[ArmState], user: &UserState, candidates: &[ScoredMeal]) -> usize {
        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;

        for (index, candidate) in candidates.iter().enumerate() {
            let mut value = arms[candidate.meal.cuisine_id].q_value;
            if candidate.meal.prep_time > user.time_available {
                value += TIME_OVER_BUDGET_PENALTY;
            }
            if user.liked_cuisines.contains(&candidate.meal.cuisine_type) {
                value += LIKED_CUISINE_BONUS;
            }
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }

        best_index
    }

    fn epsilon_of(arms: &[ArmState]) -> f64 {
        let total: u64 = arms.iter().map(|arm| arm.n_selections).sum();
        1.0 / (1.0 + total as f64)
    }

    fn check_arm(&self, cuisine_id: usize) -> AppResult<()> {
        if cuisine_id >= self.n_cuisines {
            return Err(AppError::InvalidInput(format!(
                "cuisine id {} out of range (have {} arms)",
                cuisine_id, self.n_cuisines
            )));
        }
        Ok(())
    }

    fn read_arms(&self) -> AppResult<std::sync::RwLockReadGuard<'_, Vec<ArmState>>> {
        self.arms
            .read()
            .map_err(|_| AppError::Internal("bandit arm lock poisoned".to_string()))
    }

    fn write_arms(&self) -> AppResult<std::sync::RwLockWriteGuard<'_, Vec<ArmState>>> {
        self.arms
            .write()
            .map_err(|_| AppError::Internal("bandit arm lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateMeal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn meal(cuisine_id: usize, cuisine: &str, prep_time: u32) -> ScoredMeal {
        ScoredMeal::annotated(
            CandidateMeal {
                id: format!("m{}", cuisine_id),
                name: format!("meal {}", cuisine_id),
                cuisine_type: cuisine.to_string(),
                cuisine_id,
                prep_time,
                required_ingredients: vec![],
                difficulty: 2,
                dietary_tags: vec![],
            },
            vec![],
        )
    }

    fn user_with_budget(minutes: u32) -> UserState {
        UserState {
            time_available: minutes,
            ..UserState::default()
        }
    }

    #[test]
    fn test_new_rejects_bad_learning_rate() {
        assert!(BanditAgent::new(10, 0.0).is_err());
        assert!(BanditAgent::new(10, 1.5).is_err());
        assert!(BanditAgent::new(0, 0.1).is_err());
        assert!(BanditAgent::new(10, 1.0).is_ok());
    }

    #[test]
    fn test_fresh_agent_always_explores() {
        let agent = BanditAgent::new(10, 0.1).unwrap();
        assert_eq!(agent.epsilon(), 1.0);

        let candidates = vec![meal(0, "italian", 20), meal(1, "mexican", 30)];
        let mut rng = StdRng::seed_from_u64(7);
        // epsilon == 1.0, so every draw explores
        for _ in 0..20 {
            let index = agent
                .choose(&user_with_budget(60), &candidates, &mut rng)
                .unwrap();
            assert!(index < candidates.len());
        }
    }

    #[test]
    fn test_epsilon_decays_with_total_updates() {
        let agent = BanditAgent::new(5, 0.1).unwrap();
        agent.update(0, 1.0).unwrap();
        agent.update(3, -1.0).unwrap();
        agent.update(3, 1.0).unwrap();
        // 1 / (1 + 3), independent of which arms received the updates
        assert!((agent.epsilon() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_update_moves_q_toward_reward() {
        let agent = BanditAgent::new(10, 0.1).unwrap();

        let arm = agent.update(2, 1.0).unwrap();
        assert!((arm.q_value - 0.1).abs() < 1e-12);
        assert_eq!(arm.n_selections, 1);

        let arm = agent.update(2, 1.0).unwrap();
        assert!((arm.q_value - 0.19).abs() < 1e-12);
        assert_eq!(arm.n_selections, 2);
    }

    #[test]
    fn test_update_is_fixed_point_at_reward() {
        let agent = BanditAgent::new(10, 0.5).unwrap();
        agent.update(1, 0.6).unwrap();
        agent.update(1, 0.6).unwrap();
        let arm = agent.update(1, 0.85).unwrap();
        let before = arm.q_value;
        let after = agent.update(1, before).unwrap();
        assert!((after.q_value - before).abs() < 1e-12);
    }

    #[test]
    fn test_update_touches_only_one_arm() {
        let agent = BanditAgent::new(4, 0.1).unwrap();
        agent.update(1, 1.0).unwrap();

        for (cuisine_id, arm) in agent.snapshot().unwrap() {
            if cuisine_id == 1 {
                assert_eq!(arm.n_selections, 1);
            } else {
                assert_eq!(arm, ArmState::ZERO);
            }
        }
    }

    #[test]
    fn test_update_rejects_out_of_range_arm() {
        let agent = BanditAgent::new(4, 0.1).unwrap();
        assert!(matches!(
            agent.update(4, 1.0),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_choose_rejects_out_of_range_cuisine() {
        let agent = BanditAgent::new(2, 0.1).unwrap();
        let candidates = vec![meal(5, "martian", 20)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            agent.choose(&user_with_budget(60), &candidates, &mut rng),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_choose_rejects_empty_candidates() {
        let agent = BanditAgent::new(2, 0.1).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            agent.choose(&user_with_budget(60), &[], &mut rng),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_exploit_prefers_highest_q() {
        let agent = BanditAgent::new(3, 0.5).unwrap();
        agent.update(2, 1.0).unwrap();

        let arms: Vec<ArmState> = agent
            .snapshot()
            .unwrap()
            .into_iter()
            .map(|(_, arm)| arm)
            .collect();
        let candidates = vec![meal(0, "italian", 20), meal(2, "chinese", 20)];

        let index = BanditAgent::exploit(&arms, &user_with_budget(60), &candidates);
        assert_eq!(index, 1);
    }

    #[test]
    fn test_exploit_applies_time_penalty_and_liked_bonus() {
        let arms = vec![ArmState::ZERO; 3];
        let mut user = user_with_budget(30);
        user.liked_cuisines.insert("mexican".to_string());

        // Arm values all zero: candidate 0 is over budget (-0.5),
        // candidate 1 is liked (+0.3), candidate 2 is plain (0.0).
        let candidates = vec![
            meal(0, "italian", 90),
            meal(1, "mexican", 25),
            meal(2, "chinese", 25),
        ];

        let index = BanditAgent::exploit(&arms, &user, &candidates);
        assert_eq!(index, 1);
    }

    #[test]
    fn test_exploit_breaks_ties_by_input_order() {
        let arms = vec![ArmState::ZERO; 3];
        let candidates = vec![
            meal(0, "italian", 20),
            meal(1, "mexican", 20),
            meal(2, "chinese", 20),
        ];

        let index = BanditAgent::exploit(&arms, &user_with_budget(60), &candidates);
        assert_eq!(index, 0);
    }

    #[test]
    fn test_heavy_history_exploits_deterministically() {
        // Enough accumulated selections that a single f64 draw all but
        // never lands under epsilon.
        let rows = vec![(0, 0.1, 500_000_000u64), (1, 0.9, 500_000_000u64)];
        let agent = BanditAgent::from_snapshot(2, 0.1, &rows).unwrap();

        let candidates = vec![meal(0, "italian", 20), meal(1, "mexican", 20)];
        let mut rng = StdRng::seed_from_u64(99);
        let index = agent
            .choose(&user_with_budget(60), &candidates, &mut rng)
            .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_from_snapshot_skips_out_of_range_rows() {
        let rows = vec![(1, 0.4, 3u64), (9, 0.9, 7u64)];
        let agent = BanditAgent::from_snapshot(2, 0.1, &rows).unwrap();

        let snapshot = agent.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].1.n_selections, 3);
        assert_eq!(snapshot[0].1, ArmState::ZERO);
    }
}
