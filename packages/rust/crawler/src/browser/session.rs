use async_trait::async_trait;

use storyfeed_shared::Result;

/// One live browser session. Elements are addressed by CSS selector.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run a script in the page; its return value is discarded.
    async fn execute_script(&self, script: &str) -> Result<()>;

    /// Type `text` into the first element matching `css`.
    async fn fill(&self, css: &str, text: &str) -> Result<()>;

    async fn click(&self, css: &str) -> Result<()>;

    /// Serialized DOM of the current page.
    async fn page_source(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// Opens new browser sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}
