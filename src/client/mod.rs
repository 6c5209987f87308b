//! HTTP boundary to the museum content API.
//!
//! Collections address the API by path plus query string (a [`QueryKey`]);
//! the [`Fetcher`] trait keeps the transport swappable so tests can script
//! responses and completion order.
//!
//! [`QueryKey`]: crate::cache::QueryKey

mod error;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Response, StatusCode, Url, header};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ApiSettings;

pub use error::FetchError;

const METRIC_FETCH_TOTAL: &str = "vitrine_fetch_total";
const METRIC_FETCH_MS: &str = "vitrine_fetch_ms";

/// Fetches the raw JSON payload at `target` (`path?query`, relative to the API base).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, target: &str) -> Result<Value, FetchError>;
}

/// `reqwest`-backed [`Fetcher`].
///
/// Authentication rides on the ambient session cookie; this client never
/// logs in or out.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, FetchError> {
        Self::new(settings.base_url.as_str(), settings.timeout, &settings.user_agent)
    }

    pub fn user_agent() -> &'static str {
        concat!("vitrine/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `target` below the base URL, keeping any base path prefix.
    pub fn url(&self, target: &str) -> Result<Url, FetchError> {
        self.base
            .join(target.trim_start_matches('/'))
            .map_err(FetchError::Url)
    }

    async fn handle(target: &str, resp: Response) -> Result<Value, FetchError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized {
                target: target.to_string(),
            });
        }
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(FetchError::status(status, text));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Fetcher for ApiClient {
    #[instrument(skip(self), fields(base = %self.base))]
    async fn fetch_json(&self, target: &str) -> Result<Value, FetchError> {
        let started_at = Instant::now();
        let url = self.url(target)?;

        let result = match self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(resp) => Self::handle(target, resp).await,
            Err(err) => Err(FetchError::Http(err)),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        counter!(METRIC_FETCH_TOTAL, "outcome" => outcome).increment(1);
        histogram!(METRIC_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(outcome, elapsed_ms = started_at.elapsed().as_millis() as u64, "Fetch finished");

        result
    }
}
