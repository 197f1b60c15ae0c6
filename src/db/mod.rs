pub mod redis;
pub mod sqlite;

pub use redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use sqlite::{create_pool, init_schema, ArmStore, MealStore, UserStore};
