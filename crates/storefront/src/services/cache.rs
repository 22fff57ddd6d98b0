//! Per-user cache of remote reads.
//!
//! A read that misses takes a [`Ticket`] before going to the store. After
//! caching its result it checks the ticket against the user's generation;
//! if [`UserCache::invalidate`] ran in between, the entry is dropped again.
//! `invalidate` bumps the generation before removing the entry, so a
//! snapshot read before a mutation is never served after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use toko_core::UserId;

const MAX_USERS: u64 = 10_000;

/// Generation observed when a read started.
pub(crate) struct Ticket {
    counter: Arc<AtomicU64>,
    seen: u64,
}

pub(crate) struct UserCache<V> {
    values: Cache<UserId, V>,
    generations: Cache<UserId, Arc<AtomicU64>>,
}

impl<V> UserCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            values: Cache::builder()
                .max_capacity(MAX_USERS)
                .time_to_live(ttl)
                .build(),
            generations: Cache::builder()
                .max_capacity(MAX_USERS)
                .time_to_idle(ttl.saturating_mul(2))
                .build(),
        }
    }

    pub(crate) async fn get(&self, user: UserId) -> Option<V> {
        self.values.get(&user).await
    }

    /// Call before reading the store.
    pub(crate) async fn ticket(&self, user: UserId) -> Ticket {
        let counter = self.counter(user).await;
        let seen = counter.load(Ordering::SeqCst);
        Ticket { counter, seen }
    }

    /// Cache a value read under `ticket`, unless the user was invalidated
    /// since.
    pub(crate) async fn insert(&self, user: UserId, ticket: Ticket, value: V) {
        self.values.insert(user, value).await;

        // An evicted generation counts as a change.
        let current = self.counter(user).await;
        if !Arc::ptr_eq(&current, &ticket.counter) || current.load(Ordering::SeqCst) != ticket.seen
        {
            self.values.invalidate(&user).await;
        }
    }

    pub(crate) async fn invalidate(&self, user: UserId) {
        self.counter(user).await.fetch_add(1, Ordering::SeqCst);
        self.values.invalidate(&user).await;
    }

    async fn counter(&self, user: UserId) -> Arc<AtomicU64> {
        self.generations
            .get_with(user, async { Arc::new(AtomicU64::new(0)) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> UserCache<u32> {
        UserCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_insert_without_invalidation_is_kept() {
        let cache = cache();
        let user = UserId::random();

        let ticket = cache.ticket(user).await;
        cache.insert(user, ticket, 1).await;

        assert_eq!(cache.get(user).await, Some(1));
    }

    #[tokio::test]
    async fn test_read_started_before_invalidate_is_not_cached() {
        let cache = cache();
        let user = UserId::random();

        let stale = cache.ticket(user).await;
        cache.invalidate(user).await;
        let fresh = cache.ticket(user).await;
        cache.insert(user, fresh, 2).await;
        cache.insert(user, stale, 1).await;

        assert_ne!(cache.get(user).await, Some(1));
    }

    #[tokio::test]
    async fn test_generations_are_per_user() {
        let cache = cache();
        let (a, b) = (UserId::random(), UserId::random());

        let ticket = cache.ticket(a).await;
        cache.invalidate(b).await;
        cache.insert(a, ticket, 7).await;

        assert_eq!(cache.get(a).await, Some(7));
    }
}
