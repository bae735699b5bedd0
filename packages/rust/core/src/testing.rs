//! Shared fakes for sweep and moderation tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use storyfeed_crawler::{BrowserSession, BrowsingAgent, Fetcher, RecordingSleeper, SessionFactory};
use storyfeed_shared::{BrowserConfig, FetchConfig, Result, SiteConfig, StoryFeedError};
use storyfeed_storage::Storage;

/// Serves one fixed page source; navigation to a URL containing
/// `fail_on` errors.
struct FakeSession {
    source: String,
    fail_on: Option<String>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        match &self.fail_on {
            Some(needle) if url.contains(needle.as_str()) => {
                Err(StoryFeedError::Browser(format!("navigation to {url} timed out")))
            }
            _ => Ok(()),
        }
    }
    async fn execute_script(&self, _script: &str) -> Result<()> {
        Ok(())
    }
    async fn fill(&self, _css: &str, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn click(&self, _css: &str) -> Result<()> {
        Ok(())
    }
    async fn page_source(&self) -> Result<String> {
        Ok(self.source.clone())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct FakeFactory {
    source: String,
    fail_on: Option<String>,
    opened: AtomicUsize,
}

impl FakeFactory {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            fail_on: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            source: self.source.clone(),
            fail_on: self.fail_on.clone(),
        }))
    }
}

pub(crate) fn fetcher(sleeper: Arc<RecordingSleeper>) -> Fetcher {
    Fetcher::new(&FetchConfig::default())
        .expect("build fetcher")
        .with_sleeper(sleeper)
}

pub(crate) fn agent(
    factory: Arc<FakeFactory>,
    sleeper: Arc<RecordingSleeper>,
    base_url: &str,
) -> BrowsingAgent {
    let site = SiteConfig {
        base_url: base_url.into(),
        ..SiteConfig::default()
    };
    BrowsingAgent::new(
        factory,
        Arc::new(fetcher(sleeper.clone())),
        &site,
        &BrowserConfig::default(),
    )
    .expect("build agent")
    .with_sleeper(sleeper)
}

/// Create a temp file storage for testing.
pub(crate) async fn test_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("sf_core_test_{}.db", Uuid::now_v7()));
    Storage::open(&tmp).await.expect("open test db")
}
