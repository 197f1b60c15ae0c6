use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// SQLite database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Redis connection URL (extraction result cache)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Gemini API key for ingredient extraction and chat
    pub gemini_api_key: String,

    /// Gemini API base URL
    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of cuisine arms tracked by the bandit
    #[serde(default = "default_n_cuisines")]
    pub n_cuisines: usize,

    /// Bandit learning rate, in (0, 1]
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_database_url() -> String {
    "sqlite://mealwise.db".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_n_cuisines() -> usize {
    10
}

fn default_learning_rate() -> f64 {
    0.1
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
