//! Vitrine: client-side collection cache for museum content APIs.
//!
//! Builds canonical query keys from filter options, normalizes inconsistent
//! response shapes into `{items, total}`, applies optimistic mutations and
//! reconciles them with a fenced background refetch.

pub mod cache;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod infra;
pub mod resources;
pub mod session;
