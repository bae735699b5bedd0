//! Application configuration for storyfeed.
//!
//! User config lives at `~/.storyfeed/storyfeed.toml`.
//! A `--config` flag overrides the location; missing files fall back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoryFeedError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "storyfeed.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".storyfeed";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "storyfeed.db";

// ---------------------------------------------------------------------------
// Config structs (matching storyfeed.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Plain HTTP fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Browser automation settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site origin; relative links are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the topic index page.
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sitemap_path: default_sitemap_path(),
        }
    }
}

impl SiteConfig {
    /// Absolute URL of the topic index page.
    pub fn sitemap_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.sitemap_path.trim_start_matches('/')
        )
    }
}

fn default_base_url() -> String {
    "https://www.quora.com".into()
}
fn default_sitemap_path() -> String {
    "/sitemap".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Attempts per fetch before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds to wait between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for plain fetches and the browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1
}
fn default_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_5) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36"
        .into()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.8".into()
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, or a Selenium hub).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// `browserName` capability.
    #[serde(default = "default_browser_name")]
    pub browser_name: String,

    /// Run without a visible window.
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Scroll-and-wait cycles per topic feed.
    #[serde(default = "default_scroll_cycles")]
    pub scroll_cycles: u32,

    /// Seconds to wait after each scroll.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Seconds to wait after submitting the login form.
    #[serde(default = "default_wait_secs")]
    pub settle_secs: u64,

    /// Name of the env var holding the login email (never the value itself).
    #[serde(default = "default_email_env")]
    pub login_email_env: String,

    /// Name of the env var holding the login password.
    #[serde(default = "default_password_env")]
    pub login_password_env: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            browser_name: default_browser_name(),
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            scroll_cycles: default_scroll_cycles(),
            wait_secs: default_wait_secs(),
            settle_secs: default_wait_secs(),
            login_email_env: default_email_env(),
            login_password_env: default_password_env(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".into()
}
fn default_browser_name() -> String {
    "chrome".into()
}
fn default_true() -> bool {
    true
}
fn default_window_width() -> u32 {
    1920
}
fn default_window_height() -> u32 {
    1080
}
fn default_scroll_cycles() -> u32 {
    10
}
fn default_wait_secs() -> u64 {
    10
}
fn default_email_env() -> String {
    "STORYFEED_LOGIN_EMAIL".into()
}
fn default_password_env() -> String {
    "STORYFEED_LOGIN_PASSWORD".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to `~/.storyfeed/storyfeed.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// Login credentials resolved from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.storyfeed/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StoryFeedError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.storyfeed/storyfeed.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StoryFeedError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StoryFeedError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StoryFeedError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StoryFeedError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StoryFeedError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path: explicit config value, else the config directory.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.db_path {
        Some(path) => Ok(path.clone()),
        None => Ok(config_dir()?.join(DB_FILE_NAME)),
    }
}

/// Read login credentials from the env vars named in `[browser]`.
///
/// Returns `None` unless both are set and non-empty.
pub fn login_credentials(config: &BrowserConfig) -> Option<Credentials> {
    let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    Some(Credentials {
        email: read(&config.login_email_env)?,
        password: read(&config.login_password_env)?,
    })
}
