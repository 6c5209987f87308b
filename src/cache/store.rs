//! Collection cache storage.
//!
//! Holds one [`NormalizedCollection`] per [`QueryKey`]. Fetch results replace
//! entries wholesale; optimistic mutations patch them in place between fetches.
//! The outcome of the newest settled fetch is kept per key as well, so every
//! collection reading a key reports the same ready or error state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use metrics::counter;
use tracing::debug;

use super::config::CacheConfig;
use super::fence::{FetchTicket, RequestFence};
use super::item::{CollectionItem, ItemId, NormalizedCollection};
use super::keys::QueryKey;
use super::lock::{rw_read, rw_write};
use crate::client::FetchError;

const SOURCE: &str = "cache::store";
const METRIC_CACHE_WRITE_TOTAL: &str = "vitrine_cache_write_total";

/// Where a newly inserted item lands in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Newest first (stories, gallery media).
    Front,
    /// Server order, new items last (museums).
    Back,
}

/// Outcome of a fetch result write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// A newer request for the same key was issued; the result was dropped.
    Fenced,
}

/// How the newest settled fetch for a key ended.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ready,
    Failed(Arc<FetchError>),
}

impl FetchOutcome {
    pub fn error(&self) -> Option<&Arc<FetchError>> {
        match self {
            Self::Ready => None,
            Self::Failed(error) => Some(error),
        }
    }
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Shared cache of normalized collections keyed by [`QueryKey`].
///
/// Instances are injected into every collection that reads them; there is no
/// process-wide singleton. Mutations on one key never touch another.
pub struct CollectionCache<T> {
    config: CacheConfig,
    entries: RwLock<HashMap<QueryKey, NormalizedCollection<T>>>,
    outcomes: RwLock<HashMap<QueryKey, FetchOutcome>>,
    fence: RequestFence,
}

impl<T: CollectionItem> CollectionCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            outcomes: RwLock::new(HashMap::new()),
            fence: RequestFence::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &QueryKey) -> Option<NormalizedCollection<T>> {
        rw_read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    /// Unconditional full replace.
    pub fn set(&self, key: QueryKey, collection: NormalizedCollection<T>) {
        rw_write(&self.entries, SOURCE, "set").insert(key, collection);
    }

    /// Register a fetch for `ticket.key` before it is sent.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        self.fence.issue(key)
    }

    /// Store a fetch result, unless fencing is on and a newer fetch for the
    /// same key has been issued since `ticket`.
    pub fn complete_fetch(
        &self,
        ticket: &FetchTicket,
        collection: NormalizedCollection<T>,
    ) -> WriteOutcome {
        let mut entries = rw_write(&self.entries, SOURCE, "complete_fetch");
        if self.config.fencing && !self.fence.is_current(ticket) {
            debug!(
                key = %ticket.key,
                sequence = ticket.sequence,
                latest = ?self.fence.latest(&ticket.key),
                "Dropped superseded fetch result"
            );
            counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "fenced").increment(1);
            return WriteOutcome::Fenced;
        }
        entries.insert(ticket.key.clone(), collection);
        rw_write(&self.outcomes, SOURCE, "complete_fetch")
            .insert(ticket.key.clone(), FetchOutcome::Ready);
        counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "applied").increment(1);
        WriteOutcome::Applied
    }

    /// Record a failed fetch for `ticket.key`, under the same fencing rule as
    /// [`complete_fetch`](Self::complete_fetch). The cached entry is left as is.
    pub fn fail_fetch(&self, ticket: &FetchTicket, error: FetchError) -> WriteOutcome {
        // Same lock order as `complete_fetch`: entries, then fence, then outcomes.
        let _entries = rw_write(&self.entries, SOURCE, "fail_fetch");
        if !self.is_current(ticket) {
            debug!(
                key = %ticket.key,
                sequence = ticket.sequence,
                "Dropped superseded fetch failure"
            );
            counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "fenced").increment(1);
            return WriteOutcome::Fenced;
        }
        rw_write(&self.outcomes, SOURCE, "fail_fetch")
            .insert(ticket.key.clone(), FetchOutcome::Failed(Arc::new(error)));
        counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "failed").increment(1);
        WriteOutcome::Applied
    }

    /// Outcome of the newest settled fetch for `key`; `None` until one settles.
    pub fn outcome(&self, key: &QueryKey) -> Option<FetchOutcome> {
        rw_read(&self.outcomes, SOURCE, "outcome").get(key).cloned()
    }

    /// Whether `ticket` is still the newest fetch for its key.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        !self.config.fencing || self.fence.is_current(ticket)
    }

    /// Replace the item with the same id in place, or insert it at `position`.
    ///
    /// `total` grows only on insert. A missing entry is created.
    pub fn upsert_item(&self, key: &QueryKey, item: T, position: InsertPosition) -> UpsertOutcome {
        let mut entries = rw_write(&self.entries, SOURCE, "upsert_item");
        let collection = entries.entry(key.clone()).or_default();

        let existing = item
            .item_id()
            .and_then(|id| collection.position_of(&id));
        match existing {
            Some(index) => {
                collection.items[index] = item;
                UpsertOutcome::Replaced
            }
            None => {
                insert_at(collection, item, position);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Insert `item` at `position` without an id check; `total` grows by one.
    ///
    /// A duplicate id stays visible until the next fetch replaces the entry.
    pub fn append_item(&self, key: &QueryKey, item: T, position: InsertPosition) {
        let mut entries = rw_write(&self.entries, SOURCE, "append_item");
        let collection = entries.entry(key.clone()).or_default();
        insert_at(collection, item, position);
    }

    /// Remove the first item with `id`. Absent ids are a no-op.
    ///
    /// Returns whether an item was removed.
    pub fn remove_item(&self, key: &QueryKey, id: &ItemId) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_item");
        let Some(collection) = entries.get_mut(key) else {
            return false;
        };
        let Some(index) = collection.position_of(id) else {
            return false;
        };
        collection.items.remove(index);
        collection.total = collection.total.saturating_sub(1);
        true
    }

    /// Drop the entry for `key` and any outstanding fetch tickets for it.
    pub fn invalidate(&self, key: &QueryKey) {
        rw_write(&self.entries, SOURCE, "invalidate").remove(key);
        rw_write(&self.outcomes, SOURCE, "invalidate").remove(key);
        self.fence.forget(key);
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
        rw_write(&self.outcomes, SOURCE, "clear").clear();
        self.fence.clear();
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: CollectionItem> Default for CollectionCache<T> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn insert_at<T>(collection: &mut NormalizedCollection<T>, item: T, position: InsertPosition) {
    match position {
        InsertPosition::Front => collection.items.insert(0, item),
        InsertPosition::Back => collection.items.push(item),
    }
    collection.total = collection.total.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::{Value, json};

    use super::*;
    use crate::cache::keys::FilterOptions;

    fn key() -> QueryKey {
        QueryKey::build("/api/stories", &FilterOptions::new().approved(true))
    }

    fn seeded(total: u64) -> CollectionCache<Value> {
        let cache = CollectionCache::default();
        cache.set(
            key(),
            NormalizedCollection::new(
                vec![json!({"id": 1, "title": "a"}), json!({"id": 2, "title": "b"})],
                total,
            ),
        );
        cache
    }

    #[test]
    fn set_then_get() {
        let cache = seeded(5);
        let collection = cache.get(&key()).expect("cached collection");
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.total, 5);
        assert!(cache.get(&QueryKey::build("/api/stories", &FilterOptions::new())).is_none());
    }

    #[test]
    fn upsert_existing_id_replaces_in_place() {
        let cache = seeded(5);
        let outcome = cache.upsert_item(&key(), json!({"id": 2, "title": "B"}), InsertPosition::Front);
        assert_eq!(outcome, UpsertOutcome::Replaced);

        let collection = cache.get(&key()).expect("cached collection");
        assert_eq!(collection.items.len(), 2);
        assert_eq!(collection.total, 5);
        assert_eq!(collection.items[1]["title"], "B");
    }

    #[test]
    fn upsert_new_id_respects_position_and_counts() {
        let cache = seeded(2);
        cache.upsert_item(&key(), json!({"id": 3}), InsertPosition::Front);
        cache.upsert_item(&key(), json!({"id": 4}), InsertPosition::Back);

        let collection = cache.get(&key()).expect("cached collection");
        let ids: Vec<_> = collection.items.iter().map(|item| item["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(1), json!(2), json!(4)]);
        assert_eq!(collection.total, 4);
    }

    #[test]
    fn upsert_on_missing_entry_creates_it() {
        let cache: CollectionCache<Value> = CollectionCache::default();
        cache.upsert_item(&key(), json!({"id": 1}), InsertPosition::Back);
        let collection = cache.get(&key()).expect("created entry");
        assert_eq!(collection.total, 1);
    }

    #[test]
    fn append_does_not_deduplicate() {
        let cache = seeded(2);
        cache.append_item(&key(), json!({"id": 1, "title": "again"}), InsertPosition::Front);
        let collection = cache.get(&key()).expect("cached collection");
        assert_eq!(collection.items.len(), 3);
        assert_eq!(collection.total, 3);
        assert_eq!(collection.items[0]["title"], "again");
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let cache = seeded(2);
        assert!(!cache.remove_item(&key(), &ItemId::Int(99)));
        let collection = cache.get(&key()).expect("cached collection");
        assert_eq!(collection.items.len(), 2);
        assert_eq!(collection.total, 2);
    }

    #[test]
    fn remove_never_drives_total_negative() {
        let cache = seeded(0);
        assert!(cache.remove_item(&key(), &ItemId::Int(1)));
        assert!(cache.remove_item(&key(), &ItemId::Int(2)));
        let collection = cache.get(&key()).expect("cached collection");
        assert!(collection.items.is_empty());
        assert_eq!(collection.total, 0);
    }

    #[test]
    fn mutations_stay_within_their_key() {
        let cache = seeded(2);
        let other = QueryKey::build("/api/stories", &FilterOptions::new().approved(false));
        cache.set(other.clone(), NormalizedCollection::new(vec![json!({"id": 1})], 1));

        cache.remove_item(&key(), &ItemId::Int(1));
        assert_eq!(cache.get(&other).expect("other entry").items.len(), 1);
    }

    #[test]
    fn superseded_fetch_is_fenced() {
        let cache: CollectionCache<Value> = CollectionCache::default();
        let slow = cache.begin_fetch(&key());
        let fast = cache.begin_fetch(&key());

        let newer = NormalizedCollection::new(vec![json!({"id": "new"})], 1);
        assert_eq!(cache.complete_fetch(&fast, newer.clone()), WriteOutcome::Applied);

        let older = NormalizedCollection::new(vec![json!({"id": "old"})], 1);
        assert_eq!(cache.complete_fetch(&slow, older), WriteOutcome::Fenced);
        assert_eq!(cache.get(&key()), Some(newer));
    }

    #[test]
    fn unfenced_cache_lets_last_completion_win() {
        let cache: CollectionCache<Value> = CollectionCache::new(CacheConfig::unfenced());
        let slow = cache.begin_fetch(&key());
        let fast = cache.begin_fetch(&key());

        cache.complete_fetch(&fast, NormalizedCollection::new(vec![json!({"id": "new"})], 1));
        let older = NormalizedCollection::new(vec![json!({"id": "old"})], 1);
        assert_eq!(cache.complete_fetch(&slow, older.clone()), WriteOutcome::Applied);
        assert_eq!(cache.get(&key()), Some(older));
    }

    #[test]
    fn failure_keeps_entry_and_is_shared_per_key() {
        let cache = seeded(2);
        let ticket = cache.begin_fetch(&key());
        let error = FetchError::status(reqwest::StatusCode::BAD_GATEWAY, "upstream");

        assert_eq!(cache.fail_fetch(&ticket, error), WriteOutcome::Applied);
        assert_eq!(cache.get(&key()).expect("stale entry").items.len(), 2);
        assert!(matches!(cache.outcome(&key()), Some(FetchOutcome::Failed(_))));

        let retry = cache.begin_fetch(&key());
        cache.complete_fetch(&retry, NormalizedCollection::empty());
        assert!(matches!(cache.outcome(&key()), Some(FetchOutcome::Ready)));
    }

    #[test]
    fn superseded_failure_is_fenced() {
        let cache: CollectionCache<Value> = CollectionCache::default();
        let slow = cache.begin_fetch(&key());
        let fast = cache.begin_fetch(&key());
        cache.complete_fetch(&fast, NormalizedCollection::empty());

        let error = FetchError::status(reqwest::StatusCode::GATEWAY_TIMEOUT, "slow");
        assert_eq!(cache.fail_fetch(&slow, error), WriteOutcome::Fenced);
        assert!(matches!(cache.outcome(&key()), Some(FetchOutcome::Ready)));
    }

    #[test]
    fn invalidate_drops_entry_and_tickets() {
        let cache = seeded(2);
        let ticket = cache.begin_fetch(&key());
        cache.invalidate(&key());
        assert!(!cache.contains(&key()));
        assert!(cache.outcome(&key()).is_none());
        assert_eq!(
            cache.complete_fetch(&ticket, NormalizedCollection::empty()),
            WriteOutcome::Fenced
        );
    }

    #[test]
    fn cache_recovers_from_poisoned_lock() {
        let cache = seeded(2);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.set(key(), NormalizedCollection::empty());
        assert_eq!(cache.get(&key()), Some(NormalizedCollection::empty()));
    }
}
