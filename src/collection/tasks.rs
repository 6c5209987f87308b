use std::sync::Mutex;

use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::cache::mutex_lock;

const SOURCE: &str = "collection::tasks";

/// Background fetches owned by one collection, aborted on teardown.
#[derive(Default)]
pub(crate) struct TaskSet {
    handles: Mutex<Vec<AbortHandle>>,
}

impl TaskSet {
    pub(crate) fn track<O>(&self, handle: &JoinHandle<O>) {
        let mut handles = mutex_lock(&self.handles, SOURCE, "track");
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle.abort_handle());
    }

    /// Abort every unfinished task. Returns how many were still running.
    pub(crate) fn abort_all(&self) -> usize {
        let mut handles = mutex_lock(&self.handles, SOURCE, "abort_all");
        let running = handles.iter().filter(|handle| !handle.is_finished()).count();
        for handle in handles.drain(..) {
            handle.abort();
        }
        if running > 0 {
            debug!(running, "Aborted in-flight collection fetches");
        }
        running
    }

    pub(crate) fn running(&self) -> usize {
        mutex_lock(&self.handles, SOURCE, "running")
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}
