//! Bounded path → backend id cache.
//!
//! Drivers that address objects by id resolve paths segment by segment. The
//! cache remembers positive resolutions for a limited time and forgets a path
//! together with everything beneath it whenever a write touches it.

use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::trace;

use crate::path;

#[derive(Debug, Clone)]
struct CachedId {
    id: String,
    is_dir: bool,
    cached_at: DateTime<Utc>,
}

/// A cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
    pub is_dir: bool,
}

pub struct PathIdCache {
    entries: RwLock<LruCache<String, CachedId>>,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl PathIdCache {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36_500));
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Cached id of `path`, unless absent or expired.
    pub async fn get(&self, path: &str) -> Option<ResolvedId> {
        let mut entries = self.entries.write().await;
        let expired = match entries.get(path) {
            None => return None,
            Some(entry) => self.clock.now() - entry.cached_at >= self.ttl,
        };

        if expired {
            trace!(path, "Path cache entry expired");
            entries.pop(path);
            return None;
        }

        entries.get(path).map(|entry| ResolvedId {
            id: entry.id.clone(),
            is_dir: entry.is_dir,
        })
    }

    pub async fn insert(&self, path: &str, id: impl Into<String>, is_dir: bool) {
        let entry = CachedId {
            id: id.into(),
            is_dir,
            cached_at: self.clock.now(),
        };
        self.entries.write().await.put(path.to_string(), entry);
    }

    /// Forgets `path` and every cached descendant.
    pub async fn invalidate(&self, path: &str) {
        let mut entries = self.entries.write().await;
        let stale: Vec<String> = entries
            .iter()
            .filter(|(cached, _)| path::is_within(cached, path))
            .map(|(cached, _)| cached.clone())
            .collect();

        for cached in &stale {
            entries.pop(cached);
        }
        if !stale.is_empty() {
            trace!(path, removed = stale.len(), "Invalidated path cache subtree");
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now = *now + ChronoDuration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn cache(capacity: usize) -> (PathIdCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let cache = PathIdCache::new(capacity, Duration::from_secs(60), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let (cache, clock) = cache(8);
        cache.insert("notes", "id-1", true).await;
        assert_eq!(
            cache.get("notes").await,
            Some(ResolvedId {
                id: "id-1".to_string(),
                is_dir: true
            })
        );

        clock.advance(60);
        assert_eq!(cache.get("notes").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let (cache, _) = cache(2);
        cache.insert("a", "1", true).await;
        cache.insert("b", "2", true).await;
        cache.get("a").await;
        cache.insert("c", "3", true).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_invalidate_removes_subtree_only() {
        let (cache, _) = cache(16);
        cache.insert("CourseA", "1", true).await;
        cache.insert("CourseA/notes", "2", true).await;
        cache.insert("CourseA/notes/note1.md", "3", false).await;
        cache.insert("CourseAB", "4", true).await;

        cache.invalidate("CourseA").await;

        assert!(cache.get("CourseA").await.is_none());
        assert!(cache.get("CourseA/notes/note1.md").await.is_none());
        assert!(cache.get("CourseAB").await.is_some());
    }
}
