use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::AppState;

const SHARED_ENTRY_TTL: u64 = 60; // 1 minute

fn shared_key(token: &str) -> String {
    format!("share:{}", token)
}

pub struct CacheService;

impl CacheService {
    /// Cache the public projection of a shared entry by share token
    pub async fn cache_shared_entry<T: Serialize>(
        redis: &mut ConnectionManager,
        token: &str,
        entry: &T,
    ) -> Result<(), redis::RedisError> {
        let Ok(value) = serde_json::to_string(entry) else {
            return Ok(());
        };
        redis.set_ex(shared_key(token), value, SHARED_ENTRY_TTL).await
    }

    pub async fn get_shared_entry<T: DeserializeOwned>(
        redis: &mut ConnectionManager,
        token: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let value: Option<String> = redis.get(shared_key(token)).await?;
        Ok(value.and_then(|v| serde_json::from_str(&v).ok()))
    }

    pub async fn invalidate_shared_entry(
        redis: &mut ConnectionManager,
        token: &str,
    ) -> Result<(), redis::RedisError> {
        redis.del(shared_key(token)).await
    }
}

// Request-path wrappers: caching is optional and its failures never fail a request.

pub async fn lookup_shared<T: DeserializeOwned>(state: &AppState, token: &str) -> Option<T> {
    let mut redis = state.redis.clone()?;
    match CacheService::get_shared_entry(&mut redis, token).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(error = %e, "Shared entry cache read failed");
            None
        }
    }
}

pub async fn store_shared<T: Serialize>(state: &AppState, token: &str, entry: &T) {
    let Some(mut redis) = state.redis.clone() else {
        return;
    };
    if let Err(e) = CacheService::cache_shared_entry(&mut redis, token, entry).await {
        tracing::warn!(error = %e, "Shared entry cache write failed");
    }
}

pub async fn forget_shared(state: &AppState, token: Option<&str>) {
    let (Some(mut redis), Some(token)) = (state.redis.clone(), token) else {
        return;
    };
    if let Err(e) = CacheService::invalidate_shared_entry(&mut redis, token).await {
        tracing::warn!(error = %e, "Shared entry cache invalidation failed");
    }
}
