//! Vitrine collection cache.
//!
//! Client-side cache for museum content collections:
//!
//! - **Keys**: canonical, order-stable query keys built from filter options
//! - **Normalization**: uniform `{items, total}` from inconsistent response shapes
//! - **Store**: one normalized collection and fetch outcome per key, with fenced writes
//! - **Mutations**: optimistic local edits reconciled by a refetch
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! fencing = true
//! reconcile_after_mutation = true
//! ```

mod config;
mod fence;
mod item;
mod keys;
mod lock;
mod mutator;
mod normalize;
mod store;

pub(crate) use lock::{mutex_lock, rw_read, rw_write};

pub use config::CacheConfig;
pub use fence::{FetchTicket, RequestFence, Sequence};
pub use item::{CollectionItem, ItemId, NormalizedCollection};
pub use keys::{FilterOptions, FilterValue, QueryKey};
pub use mutator::{Mutation, MutationEffect, OptimisticMutator};
pub use normalize::{Normalized, ResponseNormalizer, ResponseShape};
pub use store::{CollectionCache, FetchOutcome, InsertPosition, UpsertOutcome, WriteOutcome};
