use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::cache::{
    CollectionCache, CollectionItem, QueryKey, ResponseNormalizer, WriteOutcome,
};
use crate::client::Fetcher;

use super::state::LoadState;

/// Fetch → normalize → fenced write for one query key.
pub(crate) struct CollectionLoader<T> {
    pub(crate) key: QueryKey,
    pub(crate) cache: Arc<CollectionCache<T>>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) normalizer: Arc<ResponseNormalizer>,
    pub(crate) state: LoadState,
}

impl<T> Clone for CollectionLoader<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            cache: Arc::clone(&self.cache),
            fetcher: Arc::clone(&self.fetcher),
            normalizer: Arc::clone(&self.normalizer),
            state: self.state.clone(),
        }
    }
}

impl<T: CollectionItem + DeserializeOwned> CollectionLoader<T> {
    /// Success and failure both settle through the cache, so the outcome is
    /// visible to every collection on the key, and only if this fetch is still
    /// the newest one issued.
    #[instrument(skip(self), fields(key = %self.key))]
    pub(crate) async fn run(&self) {
        let ticket = self.cache.begin_fetch(&self.key);
        let _in_flight = self.state.start();
        debug!(sequence = ticket.sequence, "Collection fetch issued");

        match self.fetcher.fetch_json(self.key.as_str()).await {
            Ok(raw) => {
                let normalized = self.normalizer.normalize_as::<T>(&raw);
                let count = normalized.collection.items.len();
                let total = normalized.collection.total;
                match self.cache.complete_fetch(&ticket, normalized.collection) {
                    WriteOutcome::Applied => info!(
                        sequence = ticket.sequence,
                        count,
                        total,
                        shape = normalized.shape.as_label(),
                        "Collection fetched"
                    ),
                    WriteOutcome::Fenced => debug!(
                        sequence = ticket.sequence,
                        "Collection fetch superseded by a newer request"
                    ),
                }
            }
            Err(err) => {
                warn!(
                    sequence = ticket.sequence,
                    error = %err,
                    error_kind = err.kind(),
                    stale_available = self.cache.contains(&self.key),
                    "Collection fetch failed"
                );
                if self.cache.fail_fetch(&ticket, err) == WriteOutcome::Fenced {
                    debug!(
                        sequence = ticket.sequence,
                        "Collection failure superseded by a newer request"
                    );
                }
            }
        }
    }
}
