use crate::{ApiError, ApiResult};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use recipe_core::{Settings, Store};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub settings: Arc<Settings>,
    pub rate_limiter: Arc<DefaultDirectRateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Store, settings: Settings) -> Self {
        let per_minute = NonZeroU32::new(settings.security.rate_limit_per_minute)
            .unwrap_or(NonZeroU32::MIN);
        Self {
            store,
            settings: Arc::new(settings),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            started_at: Instant::now(),
        }
    }

    /// Run a store call on the blocking pool.
    pub async fn db<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Store) -> recipe_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
