//! Scripted in-memory fetcher for collection tests.
//!
//! Responses are served in the order they were queued. A gated response
//! blocks until its [`Release`] handle fires, which lets a test decide the
//! completion order of concurrent fetches.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::oneshot;
use vitrine::client::{FetchError, Fetcher};

struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    result: Result<Value, FetchError>,
}

#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Scripted>>,
    targets: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

pub struct Release(oneshot::Sender<()>);

impl Release {
    pub fn fire(self) {
        let _ = self.0.send(());
    }
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: Value) {
        self.push(None, Ok(body));
    }

    pub fn fail(&self, status: StatusCode) {
        self.push(None, Err(FetchError::status(status, "scripted failure")));
    }

    pub fn respond_gated(&self, body: Value) -> Release {
        let (tx, rx) = oneshot::channel();
        self.push(Some(rx), Ok(body));
        Release(tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().expect("targets lock").clone()
    }

    /// Yield until at least `count` fetches have been issued.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls() < count {
            tokio::task::yield_now().await;
        }
    }

    fn push(&self, gate: Option<oneshot::Receiver<()>>, result: Result<Value, FetchError>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Scripted { gate, result });
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_json(&self, target: &str) -> Result<Value, FetchError> {
        let next = self.script.lock().expect("script lock").pop_front();
        self.targets
            .lock()
            .expect("targets lock")
            .push(target.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);

        let Some(Scripted { gate, result }) = next else {
            return Err(FetchError::status(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("no scripted response for {target}"),
            ));
        };
        if let Some(gate) = gate
            && gate.await.is_err()
        {
            return Err(FetchError::status(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("scripted response for {target} was abandoned"),
            ));
        }
        result
    }
}
