//! Per-key request fencing.
//!
//! Every fetch takes a [`FetchTicket`] before it goes out. Only the ticket
//! most recently issued for a key may write its result, so a slow response
//! can no longer overwrite data from a request issued after it.

use std::collections::HashMap;
use std::sync::Mutex;

use super::keys::QueryKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::fence";

/// Monotonic sequence number shared by all keys of one cache.
pub type Sequence = u64;

/// Proof that a fetch for `key` was issued at `sequence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub sequence: Sequence,
}

#[derive(Debug)]
struct FenceState {
    next: Sequence,
    latest: HashMap<QueryKey, Sequence>,
}

/// Sequence allocation and the per-key latest ticket share one lock, so the
/// newest issued ticket is always the one recorded.
pub struct RequestFence {
    state: Mutex<FenceState>,
}

impl RequestFence {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FenceState {
                next: 1,
                latest: HashMap::new(),
            }),
        }
    }

    /// Issue a ticket that supersedes every earlier ticket for `key`.
    pub fn issue(&self, key: &QueryKey) -> FetchTicket {
        let mut state = mutex_lock(&self.state, SOURCE, "issue");
        let sequence = state.next;
        state.next += 1;
        state.latest.insert(key.clone(), sequence);
        FetchTicket {
            key: key.clone(),
            sequence,
        }
    }

    /// True while no newer ticket has been issued for the same key.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        mutex_lock(&self.state, SOURCE, "is_current")
            .latest
            .get(&ticket.key)
            .is_some_and(|latest| *latest == ticket.sequence)
    }

    /// Sequence of the newest ticket for `key`, if any was issued.
    pub fn latest(&self, key: &QueryKey) -> Option<Sequence> {
        mutex_lock(&self.state, SOURCE, "latest")
            .latest
            .get(key)
            .copied()
    }

    pub fn forget(&self, key: &QueryKey) {
        mutex_lock(&self.state, SOURCE, "forget").latest.remove(key);
    }

    /// Drop every recorded ticket. Sequence numbers keep increasing.
    pub fn clear(&self) {
        mutex_lock(&self.state, SOURCE, "clear").latest.clear();
    }
}

impl Default for RequestFence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::FilterOptions;

    fn key(path: &str) -> QueryKey {
        QueryKey::build(path, &FilterOptions::default())
    }

    #[test]
    fn newer_ticket_supersedes_older() {
        let fence = RequestFence::new();
        let first = fence.issue(&key("/api/stories"));
        let second = fence.issue(&key("/api/stories"));

        assert!(second.sequence > first.sequence);
        assert!(!fence.is_current(&first));
        assert!(fence.is_current(&second));
    }

    #[test]
    fn keys_are_fenced_independently() {
        let fence = RequestFence::new();
        let stories = fence.issue(&key("/api/stories"));
        let museums = fence.issue(&key("/api/museums"));

        assert!(fence.is_current(&stories));
        assert!(fence.is_current(&museums));
        assert_eq!(fence.latest(&key("/api/stories")), Some(stories.sequence));
    }

    #[test]
    fn forgotten_key_rejects_outstanding_tickets() {
        let fence = RequestFence::new();
        let ticket = fence.issue(&key("/api/media"));
        fence.forget(&key("/api/media"));
        assert!(!fence.is_current(&ticket));
        assert_eq!(fence.latest(&key("/api/media")), None);
    }

    #[test]
    fn concurrent_issue_records_the_newest_ticket() {
        let fence = RequestFence::new();
        let key = key("/api/stories");

        for _ in 0..200 {
            let issued: Vec<Sequence> = std::thread::scope(|scope| {
                let workers: Vec<_> = (0..8)
                    .map(|_| scope.spawn(|| fence.issue(&key).sequence))
                    .collect();
                workers
                    .into_iter()
                    .map(|worker| worker.join().expect("issuer thread"))
                    .collect()
            });

            let newest = issued.iter().copied().max().expect("tickets issued");
            assert_eq!(fence.latest(&key), Some(newest));
            let current = issued
                .iter()
                .filter(|sequence| {
                    fence.is_current(&FetchTicket {
                        key: key.clone(),
                        sequence: **sequence,
                    })
                })
                .count();
            assert_eq!(current, 1);
        }
    }
}
