//! Page acquisition: plain HTTP fetches and a scriptable browser.
//!
//! This crate provides:
//! - [`Fetcher`]: GET with bounded retry and a fixed inter-attempt delay
//! - [`browser`]: the browser session seam, its WebDriver implementation,
//!   and the [`BrowsingAgent`] that paginates topic feeds
//! - [`clock`]: the sleep abstraction used for every timed wait

pub mod browser;
pub mod clock;
pub mod fetcher;

pub use browser::{
    BrowserSession, BrowsingAgent, SessionFactory, WebDriverFactory, WebDriverSession,
    scroll_cycles,
};
pub use clock::{RecordingSleeper, Sleeper, TokioSleeper};
pub use fetcher::{FetchedPage, Fetcher};
