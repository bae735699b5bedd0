//! Shared types, error model, and configuration for storyfeed.
//!
//! This crate is the foundation depended on by all other storyfeed crates.
//! It provides:
//! - [`StoryFeedError`]: the unified error type
//! - Domain types ([`Topic`], [`Task`], [`TaskStatus`], [`Story`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, Credentials, FetchConfig, SiteConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, login_credentials,
    resolve_db_path,
};
pub use error::{Result, StoryFeedError};
pub use types::{
    AuthorField, AuthorMap, Story, StoryAuthor, Task, TaskStatus, Topic, UPVOTE_THRESHOLD,
    exceeds_threshold,
};
