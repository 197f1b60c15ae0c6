pub mod bandit;
pub mod chat;
pub mod feedback;
pub mod providers;
pub mod selector;
pub mod suggestions;

pub use bandit::{ArmState, BanditAgent};
pub use providers::{GeminiProvider, GenerativeProvider};
pub use selector::{EngineConfig, RecommendationEngine, ScoringWeights};
