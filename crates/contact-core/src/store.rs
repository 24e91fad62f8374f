//! Typed KV/list/set primitives with TTL, atop a shared in-process store.
//!
//! Spec §4.1 treats the key/value store as an external collaborator and
//! specifies only the primitive operations the rest of the system consumes.
//! This is the in-memory implementation of that primitive surface: single
//! logical instance, individually-atomic operations, no cross-operation
//! transactions — exactly the guarantee spec §4.1 and §5 rely on ("the
//! Engine must tolerate interleavings via refresh-before-write").
//!
//! A networked backend (redis and friends) would implement the same
//! primitive surface; nothing above this module depends on the fact that
//! this one happens to live in-process.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Default)]
struct Shards {
    strings: HashMap<String, StringEntry>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, Vec<String>>,
    sets: HashMap<String, HashSet<String>>,
}

/// An in-process stand-in for the shared KV store spec §4.1 describes.
///
/// All operations are individually atomic (guarded by the same lock) but a
/// caller composing several calls gets no cross-call isolation, matching the
/// store's documented "not transactional" contract.
#[derive(Default)]
pub struct Store {
    shards: RwLock<Shards>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let shards = self.shards.read().await;
        match shards.strings.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            _ => None,
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut shards = self.shards.write().await;
        shards.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    pub async fn del(&self, keys: &[&str]) {
        let mut shards = self.shards.write().await;
        for key in keys {
            shards.strings.remove(*key);
            shards.hashes.remove(*key);
            shards.lists.remove(*key);
            shards.sets.remove(*key);
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let shards = self.shards.read().await;
        match shards.strings.get(key) {
            Some(entry) => !entry.is_expired(),
            None => shards.hashes.contains_key(key) || shards.lists.contains_key(key),
        }
    }

    pub async fn hgetall(&self, key: &str) -> HashMap<String, String> {
        let shards = self.shards.read().await;
        shards.hashes.get(key).cloned().unwrap_or_default()
    }

    pub async fn hset(&self, key: &str, map: HashMap<String, String>) {
        let mut shards = self.shards.write().await;
        shards.hashes.insert(key.to_string(), map);
    }

    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64 {
        let mut shards = self.shards.write().await;
        let hash = shards.hashes.entry(key.to_string()).or_default();
        let current: i64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
        let updated = current + delta;
        hash.insert(field.to_string(), updated.to_string());
        updated
    }

    pub async fn rpush(&self, key: &str, value: &str) {
        let mut shards = self.shards.write().await;
        shards.lists.entry(key.to_string()).or_default().push(value.to_string());
    }

    pub async fn lpush(&self, key: &str, value: &str) {
        let mut shards = self.shards.write().await;
        shards.lists.entry(key.to_string()).or_default().insert(0, value.to_string());
    }

    /// Matches redis `LRANGE` semantics: `stop == -1` means "to the end".
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Vec<String> {
        let shards = self.shards.read().await;
        let Some(list) = shards.lists.get(key) else {
            return Vec::new();
        };
        let len = list.len() as i64;
        if len == 0 {
            return Vec::new();
        }
        let normalize = |i: i64| -> i64 {
            if i < 0 { (len + i).max(0) } else { i.min(len - 1).max(0) }
        };
        let start = normalize(start);
        let stop = if stop < 0 { (len + stop).max(-1) } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Vec::new();
        }
        list[start as usize..=(stop as usize)].to_vec()
    }

    pub async fn sadd(&self, key: &str, value: &str) {
        let mut shards = self.shards.write().await;
        shards.sets.entry(key.to_string()).or_default().insert(value.to_string());
    }

    pub async fn sismember(&self, key: &str, value: &str) -> bool {
        let shards = self.shards.read().await;
        shards.sets.get(key).is_some_and(|s| s.contains(value))
    }
}
