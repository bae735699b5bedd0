//! Plain HTTP GET with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, error, instrument, warn};

use storyfeed_shared::{FetchConfig, Result, StoryFeedError};

use crate::clock::{Sleeper, TokioSleeper};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

// ---------------------------------------------------------------------------
// FetchedPage
// ---------------------------------------------------------------------------

/// A successful response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP GET client that retries failed attempts after a fixed delay.
pub struct Fetcher {
    client: Client,
    sleeper: Arc<dyn Sleeper>,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    /// Build a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        let language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            StoryFeedError::config(format!("invalid accept_language header: {e}"))
        })?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoryFeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            sleeper: Arc::new(TokioSleeper),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// `fetch` with the configured retry bound and delay and no query params.
    pub async fn get(&self, url: &str) -> Result<FetchedPage> {
        self.fetch(url, &[], self.max_retries, self.retry_delay)
            .await
    }

    /// GET `url` with `params`, making at most `max_retries` attempts.
    ///
    /// Transport errors and non-success statuses both count as a failed
    /// attempt. Every failed attempt is logged with its index and followed by
    /// a `delay` sleep unless it was the last one. Exhaustion yields
    /// [`StoryFeedError::Fetch`]; nothing above this call retries again.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        max_retries: u32,
        delay: Duration,
    ) -> Result<FetchedPage> {
        let attempts = max_retries.max(1);
        let query = encode_params(params);

        for attempt in 1..=attempts {
            match self.attempt(url, params).await {
                Ok(page) => {
                    debug!(attempt, status = page.status, bytes = page.body.len(), "fetched");
                    return Ok(page);
                }
                Err(e) => {
                    warn!(
                        url,
                        params = %query,
                        attempt,
                        max_retries = attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "fetch attempt failed"
                    );
                    if attempt < attempts {
                        self.sleeper.sleep(delay).await;
                    }
                }
            }
        }

        error!(url, params = %query, retries = attempts, "fetch retries exhausted");
        Err(StoryFeedError::Fetch {
            url: url.to_string(),
            params: query,
            retries: attempts,
        })
    }

    async fn attempt(&self, url: &str, params: &[(&str, &str)]) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| StoryFeedError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoryFeedError::Network(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| StoryFeedError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// `a=1&b=2`, for logs and errors.
fn encode_params(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}
