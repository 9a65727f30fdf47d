//! Process-wide `UserCache` (spec §5, §9): key→User mapping with TTL and
//! explicit invalidation on mutation.
//!
//! Built on `moka::future::Cache`, a teacher dependency
//! (`Cargo.toml: moka = { version = "0.12", features = ["future"] }`) the
//! teacher itself never exercises in the retrieved files — here it is given
//! the job spec.md assigns it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::model::User;

#[derive(Clone)]
pub struct UserCache {
    inner: Cache<i64, Arc<User>>,
}

impl UserCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).max_capacity(max_capacity).build(),
        }
    }

    pub async fn get(&self, user_id: i64) -> Option<Arc<User>> {
        self.inner.get(&user_id).await
    }

    pub async fn get_or_insert_with<F, Fut>(&self, user_id: i64, load: F) -> crate::error::Result<Arc<User>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::error::Result<User>>,
    {
        if let Some(user) = self.inner.get(&user_id).await {
            return Ok(user);
        }
        let user = Arc::new(load().await?);
        self.inner.insert(user_id, user.clone()).await;
        Ok(user)
    }

    /// Invalidates one user's cached entry. Writers must call this for the
    /// mutated user id before returning (spec §5).
    pub async fn invalidate(&self, user_id: i64) {
        self.inner.invalidate(&user_id).await;
    }

    /// Invalidates every cached user currently holding `role_id` — the
    /// "handle role scope changed" behavior spec.md §9 specifies as required
    /// rather than leaving as an open TODO.
    pub async fn invalidate_users_with_role(&self, role_id: i64) {
        let victims: Vec<i64> = self
            .inner
            .iter()
            .filter(|(_, user)| user.roles.iter().any(|r| r.id == role_id))
            .map(|(key, _)| *key)
            .collect();
        for user_id in victims {
            self.inner.invalidate(&user_id).await;
        }
    }
}
