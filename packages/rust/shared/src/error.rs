//! Error types for storyfeed.
//!
//! Library crates use [`StoryFeedError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all storyfeed operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryFeedError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A single HTTP attempt failed (transport error or non-success status).
    #[error("network error: {0}")]
    Network(String),

    /// A fetch gave up after exhausting its retries. Terminal for that fetch.
    #[error("fetch failed after {retries} attempts: {url} (params: {params})")]
    Fetch {
        url: String,
        params: String,
        retries: u32,
    },

    /// Browser session (WebDriver) error.
    #[error("browser error: {0}")]
    Browser(String),

    /// A required element was missing from an HTML page.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// An engagement count was neither all digits nor a `k`-suffixed number.
    #[error("invalid count format: {0:?}")]
    InvalidCountFormat(String),

    /// A moderation status outside {-1, 0, 1}.
    #[error("invalid status value: {0} (expected -1, 0 or 1)")]
    InvalidStatus(i64),

    /// A record looked up by id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad date range, unpublishable task, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StoryFeedError>;

impl StoryFeedError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StoryFeedError::config("missing webdriver url");
        assert_eq!(err.to_string(), "config error: missing webdriver url");

        let err = StoryFeedError::InvalidStatus(7);
        assert!(err.to_string().contains("invalid status value: 7"));
    }

    #[test]
    fn fetch_error_carries_context() {
        let err = StoryFeedError::Fetch {
            url: "https://example.com/q".into(),
            params: "[(\"page\", \"2\")]".into(),
            retries: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("https://example.com/q"));
        assert!(msg.contains("page"));
    }
}
