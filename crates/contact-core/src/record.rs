//! ObjectMapper: hash-backed typed records with calculated fields and an
//! internal/public projection (spec §4.2).
//!
//! Each concrete record (`Player`, `Room`, `Offer` — see [`crate::models`])
//! declares how it serializes to and from a store hash via the [`Entity`]
//! trait; [`Mapper`] supplies the generic `getById`/`save`/`refresh`/
//! `incrementField` operations spec §4.2 specifies, so that behavior lives
//! in exactly one place regardless of how many record types exist.

use std::collections::HashMap;

use crate::store::Store;

/// A record persisted as a single hash under `"{PREFIX}:{id}"`.
pub trait Entity: Sized + Clone {
    const PREFIX: &'static str;

    fn key_for(id: &str) -> String {
        format!("{}:{}", Self::PREFIX, id)
    }

    fn id(&self) -> &str;

    fn storage_key(&self) -> String {
        Self::key_for(self.id())
    }

    /// Encode every *stored* (non-calculated) field. Calculated fields are
    /// never persisted — spec §4.2: "They are never persisted."
    fn to_store_fields(&self) -> HashMap<String, String>;

    /// Reconstruct a record from its raw hash contents, recomputing
    /// calculated fields as part of construction.
    fn from_store_fields(id: String, raw: &HashMap<String, String>) -> Self;

    /// Apply an atomic counter delta to the in-memory mirror of `field`,
    /// without a full refresh (spec §4.2 `incrementField`).
    fn apply_increment(&mut self, field: &str, delta: i64);

    /// The non-internal, non-empty/non-null projection sent to clients
    /// (spec §4.2 `publicData`), with calculated fields recomputed fresh.
    fn public_data(&self) -> serde_json::Value;
}

/// Generic CRUD surface over any [`Entity`], backed by a [`Store`].
pub struct Mapper<'s> {
    store: &'s Store,
}

impl<'s> Mapper<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    pub async fn get_by_id<T: Entity>(&self, id: &str) -> Option<T> {
        let raw = self.store.hgetall(&T::key_for(id)).await;
        if raw.is_empty() {
            return None;
        }
        Some(T::from_store_fields(id.to_string(), &raw))
    }

    pub async fn save<T: Entity>(&self, record: &T) {
        self.store.hset(&record.storage_key(), record.to_store_fields()).await;
    }

    /// Re-read `record` from the store in place, matching spec §4.2:
    /// "re-read all fields; recompute calculated fields".
    pub async fn refresh<T: Entity>(&self, record: &mut T) {
        if let Some(fresh) = self.get_by_id::<T>(record.id()).await {
            *record = fresh;
        }
    }

    /// Atomically bump `field` by `delta` in the store and mirror the
    /// change into `record` without a full refresh.
    pub async fn increment_field<T: Entity>(&self, record: &mut T, field: &str, delta: i64) {
        self.store.hincrby(&record.storage_key(), field, delta).await;
        record.apply_increment(field, delta);
    }

    /// `getById(id)` or create a fresh record via `make_new`, returning
    /// whether it was newly created (spec §4.2 `getOrCreate`).
    pub async fn get_or_create<T: Entity>(
        &self,
        id: &str,
        make_new: impl FnOnce(String) -> T,
    ) -> (T, bool) {
        if let Some(existing) = self.get_by_id::<T>(id).await {
            return (existing, false);
        }
        let created = make_new(id.to_string());
        self.save(&created).await;
        (created, true)
    }
}
