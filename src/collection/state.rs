use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Serialize, Serializer};

use crate::cache::{FetchOutcome, NormalizedCollection};
use crate::client::FetchError;

/// Lifecycle of one collection: `idle → loading → {ready | error}`, and back
/// to `loading` on every refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Snapshot handed to callers. Nothing in it aliases the cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub status: LoadStatus,
    pub is_loading: bool,
    pub is_error: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<Arc<FetchError>>,
}

fn serialize_error<S: Serializer>(
    error: &Option<Arc<FetchError>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Fetches in flight for one collection, shared with its background tasks.
///
/// Ready and error come from the key's [`FetchOutcome`] in the cache, so
/// collections sharing a key settle together; only loading is per collection.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadState {
    in_flight: Arc<AtomicUsize>,
}

impl LoadState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark a fetch as started. The returned guard ends it, even when the
    /// fetch task is aborted.
    pub(crate) fn start(&self) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn status(&self, outcome: Option<&FetchOutcome>) -> LoadStatus {
        if self.is_loading() {
            return LoadStatus::Loading;
        }
        match outcome {
            None => LoadStatus::Idle,
            Some(FetchOutcome::Ready) => LoadStatus::Ready,
            Some(FetchOutcome::Failed(_)) => LoadStatus::Error,
        }
    }

    pub(crate) fn view<T>(
        &self,
        cached: Option<NormalizedCollection<T>>,
        outcome: Option<FetchOutcome>,
    ) -> CollectionView<T> {
        let status = self.status(outcome.as_ref());
        let error = outcome.as_ref().and_then(FetchOutcome::error).cloned();
        let collection = cached.unwrap_or_default();
        CollectionView {
            items: collection.items,
            total: collection.total,
            status,
            is_loading: self.is_loading(),
            is_error: error.is_some(),
            error,
        }
    }
}

pub(crate) struct InFlight {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
