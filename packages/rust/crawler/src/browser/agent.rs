//! Browsing agent: topic enumeration, paginated feed loading, login.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use url::Url;

use storyfeed_extract::parse_topic_index;
use storyfeed_shared::{BrowserConfig, Credentials, Result, SiteConfig, StoryFeedError, Topic};

use super::session::{BrowserSession, SessionFactory};
use crate::clock::{Sleeper, TokioSleeper};
use crate::fetcher::Fetcher;

/// Scrolls to the bottom of the page, triggering the feed's lazy loading.
pub const SCROLL_SCRIPT: &str = "window.scrollTo(0,document.body.scrollHeight);";

pub const LOGIN_EMAIL: &str = "form.inline_login_form input[name=email]";
pub const LOGIN_PASSWORD: &str = "form.inline_login_form input[name=password]";
pub const LOGIN_SUBMIT: &str = "form.inline_login_form input[type=submit]";

/// Drives one browser session for feed pagination.
///
/// The session is opened on first use and reused by later calls so cookies
/// and login state carry over.
///
/// Callers must always finish with [`BrowsingAgent::close`], on error paths
/// too. Teardown is a remote call, so dropping the agent cannot end the
/// session; it only logs a warning, and the driver keeps the browser open
/// until its own idle timeout.
pub struct BrowsingAgent {
    factory: Arc<dyn SessionFactory>,
    session: Option<Box<dyn BrowserSession>>,
    fetcher: Arc<Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    site: SiteConfig,
    base: Url,
    wait: Duration,
    settle: Duration,
}

impl BrowsingAgent {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        fetcher: Arc<Fetcher>,
        site: &SiteConfig,
        browser: &BrowserConfig,
    ) -> Result<Self> {
        let base = Url::parse(&site.base_url).map_err(|e| {
            StoryFeedError::config(format!("invalid base_url {:?}: {e}", site.base_url))
        })?;

        Ok(Self {
            factory,
            session: None,
            fetcher,
            sleeper: Arc::new(TokioSleeper),
            site: site.clone(),
            base,
            wait: Duration::from_secs(browser.wait_secs),
            settle: Duration::from_secs(browser.settle_secs),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Whether a browser session is currently open.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Load the topic index page and list the topics it links to.
    ///
    /// The index is a static page, so it goes through the fetcher rather
    /// than the browser session.
    #[instrument(skip_all)]
    pub async fn enumerate_topics(&self) -> Result<Vec<Topic>> {
        let url = self.site.sitemap_url();
        let page = self.fetcher.get(&url).await?;
        let topics = parse_topic_index(&page.body, &self.base);
        info!(url = %url, topics = topics.len(), "topic index parsed");
        Ok(topics)
    }

    /// Open `topic_url`, run `page_count` scroll-and-wait cycles, and return
    /// the rendered DOM.
    #[instrument(skip_all, fields(topic_url = %topic_url, page_count = page_count))]
    pub async fn load_topic_feed(&mut self, topic_url: &str, page_count: u32) -> Result<String> {
        let url = self
            .base
            .join(topic_url)
            .map_err(|e| StoryFeedError::validation(format!("invalid topic url {topic_url:?}: {e}")))?;
        let sleeper = Arc::clone(&self.sleeper);
        let wait = self.wait;

        let session = self.session().await?;
        session.navigate(url.as_str()).await?;
        scroll_cycles(session, sleeper.as_ref(), page_count, wait).await?;
        session.page_source().await
    }

    /// Sign in through the site's inline login form, then wait for the
    /// post-login redirect to settle.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let home = self.base.to_string();
        let sleeper = Arc::clone(&self.sleeper);
        let settle = self.settle;

        let session = self.session().await?;
        session.navigate(&home).await?;
        session.fill(LOGIN_EMAIL, &credentials.email).await?;
        session.fill(LOGIN_PASSWORD, &credentials.password).await?;
        session.click(LOGIN_SUBMIT).await?;
        info!("login submitted");

        if !settle.is_zero() {
            sleeper.sleep(settle).await;
            info!(settle_secs = settle.as_secs(), "login settle wait done");
        }
        Ok(())
    }

    /// Tear down the browser session, if one was opened.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    async fn session(&mut self) -> Result<&dyn BrowserSession> {
        if self.session.is_none() {
            info!("opening browser session");
            self.session = Some(self.factory.open().await?);
        }
        self.session
            .as_deref()
            .ok_or_else(|| StoryFeedError::Browser("browser session unavailable".into()))
    }
}

impl Drop for BrowsingAgent {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("browsing agent dropped with an open session; call close() first");
        }
    }
}

/// Run exactly `cycles` scroll-and-wait cycles and return how many ran.
///
/// There is no early exit when a scroll loads nothing new.
pub async fn scroll_cycles(
    session: &dyn BrowserSession,
    sleeper: &dyn Sleeper,
    cycles: u32,
    wait: Duration,
) -> Result<u32> {
    let mut executed = 0;
    for page in 1..=cycles {
        session.execute_script(SCROLL_SCRIPT).await?;
        info!(page, total_page = cycles, "feed page requested");
        sleeper.sleep(wait).await;
        executed += 1;
    }
    Ok(executed)
}
