//! HTML extraction for topic indexes, feed items, and answer pages.
//!
//! This crate provides:
//! - [`parse_count`]: `"1234"` / `"1.5k"` engagement counts
//! - [`parse_topic_index`]: topics from the sitemap-like index page
//! - [`parse_feed`] / [`parse_feed_item`]: candidate task fields per feed item
//! - [`parse_full_story`]: answer markup and author credentials
//! - [`credential_field_name`]: credential class name to field name mapping

mod count;
mod credential;
mod dom;
mod feed;
mod story;
mod topics;

pub use count::parse_count;
pub use credential::{camel_to_snake, credential_field_name};
pub use feed::{
    FeedItem, FeedItemOutcome, SkipReason, derive_answer_link, parse_feed, parse_feed_item,
    parse_feed_item_fragment,
};
pub use story::{FullStory, parse_full_story};
pub use topics::parse_topic_index;
