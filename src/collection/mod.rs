//! Resource collections.
//!
//! [`ResourceCollection`] wires a query key, the HTTP fetcher, the response
//! normalizer and a shared [`CollectionCache`] together, and exposes the only
//! surface other layers may use: a [`CollectionView`] snapshot, `refetch`,
//! and the optimistic `add_item` / `update_item` / `remove_item` mutations.
//!
//! Collections built with the same cache and key share one cache entry.

mod loader;
mod state;
mod tasks;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{
    CollectionCache, CollectionItem, FilterOptions, ItemId, Mutation, MutationEffect,
    OptimisticMutator, QueryKey,
};
use crate::client::Fetcher;
use crate::resources::{Resource, ResourceDescriptor};

use loader::CollectionLoader;
use state::LoadState;
use tasks::TaskSet;

pub use state::{CollectionView, LoadStatus};

/// Outcome of an optimistic mutation plus its pending reconciling refetch.
#[must_use = "dropping a Reconciliation does not cancel it; call `settled` to wait for it"]
pub struct Reconciliation {
    pub effect: MutationEffect,
    handle: Option<JoinHandle<()>>,
}

impl Reconciliation {
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the reconciling refetch. Returns immediately when none was issued.
    pub async fn settled(self) {
        if let Some(handle) = self.handle
            && let Err(err) = handle.await
        {
            debug!(cancelled = err.is_cancelled(), "Reconciling refetch did not complete");
        }
    }
}

pub struct ResourceCollection<T: CollectionItem> {
    loader: CollectionLoader<T>,
    mutator: OptimisticMutator<T>,
    tasks: TaskSet,
}

impl<T: CollectionItem + DeserializeOwned> ResourceCollection<T> {
    /// Build a collection for `descriptor.endpoint` filtered by `options`.
    ///
    /// Nothing is fetched until [`refetch`](Self::refetch) or
    /// [`spawn_refetch`](Self::spawn_refetch) is called.
    pub fn new(
        cache: Arc<CollectionCache<T>>,
        fetcher: Arc<dyn Fetcher>,
        descriptor: &ResourceDescriptor,
        options: &FilterOptions,
    ) -> Self {
        let key = QueryKey::build(&descriptor.endpoint, options);
        let mutator = OptimisticMutator::new(Arc::clone(&cache), descriptor.insert_position);
        let loader = CollectionLoader {
            key,
            cache,
            fetcher,
            normalizer: Arc::new(descriptor.normalizer()),
            state: LoadState::new(),
        };
        Self {
            loader,
            mutator,
            tasks: TaskSet::default(),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.loader.key
    }

    pub fn status(&self) -> LoadStatus {
        let outcome = self.loader.cache.outcome(&self.loader.key);
        self.loader.state.status(outcome.as_ref())
    }

    /// Current items, total and load flags.
    ///
    /// After a failed fetch the previously cached collection stays visible
    /// alongside `is_error`; with nothing cached the view is empty. Ready and
    /// error are shared with every collection on the same key.
    pub fn view(&self) -> CollectionView<T> {
        let cache = &self.loader.cache;
        self.loader
            .state
            .view(cache.get(&self.loader.key), cache.outcome(&self.loader.key))
    }

    /// Fetch now and return the resulting view.
    pub async fn refetch(&self) -> CollectionView<T> {
        self.loader.run().await;
        self.view()
    }

    /// Fetch in the background. The task is aborted if this collection is dropped.
    pub fn spawn_refetch(&self) -> JoinHandle<()> {
        let loader = self.loader.clone();
        let handle = tokio::spawn(async move { loader.run().await });
        self.tasks.track(&handle);
        handle
    }

    /// Insert `item` at the resource's insert position, then reconcile.
    pub fn add_item(&self, item: T) -> Reconciliation {
        self.mutate(Mutation::Append(item))
    }

    /// Replace the item with the same id (or insert it), then reconcile.
    pub fn update_item(&self, item: T) -> Reconciliation {
        self.mutate(Mutation::Upsert(item))
    }

    /// Remove the item with `id` if present, then reconcile.
    pub fn remove_item(&self, id: impl Into<ItemId>) -> Reconciliation {
        self.mutate(Mutation::Remove(id.into()))
    }

    fn mutate(&self, mutation: Mutation<T>) -> Reconciliation {
        let loader = self.loader.clone();
        let (effect, handle) =
            self.mutator
                .apply(&self.loader.key, mutation, async move { loader.run().await });
        if let Some(handle) = &handle {
            self.tasks.track(handle);
        }
        Reconciliation { effect, handle }
    }
}

impl<T: Resource> ResourceCollection<T> {
    /// Collection for a typed resource using its standard descriptor.
    pub fn for_resource(
        cache: Arc<CollectionCache<T>>,
        fetcher: Arc<dyn Fetcher>,
        options: &FilterOptions,
    ) -> Self {
        Self::new(cache, fetcher, &T::descriptor(), options)
    }
}

impl<T: CollectionItem> ResourceCollection<T> {
    /// Abort background fetches started by this collection.
    ///
    /// Their results are never written; the cache keeps whatever it held.
    pub fn cancel_in_flight(&self) -> usize {
        self.tasks.abort_all()
    }

    pub fn background_tasks(&self) -> usize {
        self.tasks.running()
    }
}

impl<T: CollectionItem> Drop for ResourceCollection<T> {
    fn drop(&mut self) {
        self.tasks.abort_all();
    }
}
