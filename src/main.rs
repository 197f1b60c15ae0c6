use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mealwise_api::config::Config;
use mealwise_api::db::{self, ArmStore, Cache, MealStore};
use mealwise_api::routes::{create_router, AppState};
use mealwise_api::services::{
    BanditAgent, EngineConfig, GeminiProvider, GenerativeProvider, RecommendationEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::init_schema(&pool).await?;
    MealStore::new(&pool).seed_if_empty().await?;

    let redis_client = db::create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let provider: Arc<dyn GenerativeProvider> = Arc::new(GeminiProvider::new(
        cache,
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
    ));

    let persisted_arms = ArmStore::new(&pool).load_all_arms().await?;
    let bandit = Arc::new(BanditAgent::from_snapshot(
        config.n_cuisines,
        config.learning_rate,
        &persisted_arms,
    )?);
    tracing::info!(
        arms = config.n_cuisines,
        restored = persisted_arms.len(),
        epsilon = bandit.epsilon(),
        "Bandit agent ready"
    );

    let engine = RecommendationEngine::new(bandit.clone(), EngineConfig::default());

    let state = Arc::new(AppState {
        pool,
        bandit,
        engine,
        provider,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Meal recommendation service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
