//! Optimistic mutations.
//!
//! A mutation is written to the [`CollectionCache`] synchronously, so readers
//! see it before the server confirms anything, and is followed by a
//! reconciling refetch whose result replaces the optimistic state. There is
//! no rollback: if the refetch fails, the optimistic state stays until the
//! next successful fetch.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::debug;

use super::item::{CollectionItem, ItemId};
use super::keys::QueryKey;
use super::store::{CollectionCache, InsertPosition, UpsertOutcome};

const METRIC_OPTIMISTIC_MUTATION_TOTAL: &str = "vitrine_optimistic_mutation_total";

/// A local change applied ahead of server confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    /// Replace the item with the same id, or insert it at the resource position.
    Upsert(T),
    /// Insert at the resource position without an id check.
    Append(T),
    Remove(ItemId),
}

impl<T> Mutation<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upsert(_) => "upsert",
            Self::Append(_) => "append",
            Self::Remove(_) => "remove",
        }
    }
}

/// What the local half of a mutation did to the cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEffect {
    Inserted,
    Replaced,
    Removed,
    /// Removal of an id that was not present.
    Unchanged,
}

pub struct OptimisticMutator<T> {
    cache: Arc<CollectionCache<T>>,
    position: InsertPosition,
}

impl<T: CollectionItem> OptimisticMutator<T> {
    pub fn new(cache: Arc<CollectionCache<T>>, position: InsertPosition) -> Self {
        Self { cache, position }
    }

    /// Apply `mutation` to `key` immediately. Does not reconcile.
    pub fn apply_local(&self, key: &QueryKey, mutation: Mutation<T>) -> MutationEffect {
        let kind = mutation.kind();
        let effect = match mutation {
            Mutation::Upsert(item) => match self.cache.upsert_item(key, item, self.position) {
                UpsertOutcome::Inserted => MutationEffect::Inserted,
                UpsertOutcome::Replaced => MutationEffect::Replaced,
            },
            Mutation::Append(item) => {
                self.cache.append_item(key, item, self.position);
                MutationEffect::Inserted
            }
            Mutation::Remove(id) => {
                if self.cache.remove_item(key, &id) {
                    MutationEffect::Removed
                } else {
                    MutationEffect::Unchanged
                }
            }
        };

        counter!(METRIC_OPTIMISTIC_MUTATION_TOTAL, "kind" => kind).increment(1);
        debug!(key = %key, kind, effect = ?effect, "Optimistic mutation applied");
        effect
    }

    /// Apply `mutation` locally, then spawn `reconcile` as the follow-up refetch.
    ///
    /// The refetch is skipped only when reconciliation is disabled in the
    /// cache configuration. Must be called from within a Tokio runtime.
    pub fn apply<F>(
        &self,
        key: &QueryKey,
        mutation: Mutation<T>,
        reconcile: F,
    ) -> (MutationEffect, Option<JoinHandle<()>>)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let effect = self.apply_local(key, mutation);
        if !self.cache.config().reconcile_after_mutation {
            debug!(key = %key, "Reconciliation disabled; keeping optimistic state");
            return (effect, None);
        }
        (effect, Some(tokio::spawn(reconcile)))
    }
}
