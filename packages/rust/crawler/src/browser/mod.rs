//! Scriptable browser capability.
//!
//! - [`BrowserSession`] / [`SessionFactory`]: the black-box driver seam
//! - [`WebDriverFactory`]: W3C WebDriver implementation over HTTP
//! - [`BrowsingAgent`]: topic enumeration, feed pagination, login

mod agent;
mod session;
mod webdriver;

pub use agent::{BrowsingAgent, LOGIN_EMAIL, LOGIN_PASSWORD, LOGIN_SUBMIT, SCROLL_SCRIPT, scroll_cycles};
pub use session::{BrowserSession, SessionFactory};
pub use webdriver::{WebDriverFactory, WebDriverSession};
