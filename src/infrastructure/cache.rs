//! Read-through TTL cache.
//!
//! Entries are keyed by string (`agents:<user_id>`, `user:<user_id>`) and
//! expire after a fixed time-to-live. The cache is never a source of truth:
//! a miss always falls back to the repository.

use crate::domain::{Agent, User};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct TtlCache<V> {
    entries: DashMap<String, (Instant, V)>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.value().0 > now => return Some(entry.value().1.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, (expires_at, _)| *expires_at <= now);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries
            .insert(key.into(), (Instant::now() + self.ttl, value));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop expired entries to bound memory; safe to call at any time.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (expires_at, _)| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn agents_key(user_id: Uuid) -> String {
    format!("agents:{}", user_id)
}

pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// Caches shared by the services: profiles and per-user agent lists.
pub struct AppCaches {
    pub users: TtlCache<User>,
    pub agents: TtlCache<Vec<Agent>>,
}

impl AppCaches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            users: TtlCache::new(ttl),
            agents: TtlCache::new(ttl),
        }
    }

    pub fn invalidate_user(&self, user_id: Uuid) {
        self.users.invalidate(&user_key(user_id));
    }

    pub fn invalidate_agents(&self, user_id: Uuid) {
        self.agents.invalidate(&agents_key(user_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn returns_fresh_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("k", "v".to_string());
        sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_and_purge() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        sleep(Duration::from_millis(40));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 0);
    }
}
