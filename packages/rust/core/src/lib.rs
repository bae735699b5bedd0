//! Sweep orchestration and editorial moderation for storyfeed.
//!
//! This crate ties together the browsing agent, fetcher, extractors, and
//! storage into the three batch sweeps (topic discovery, feed scan, story
//! enrichment) and the review/publish workflow.

pub mod moderation;
pub mod sweeps;

#[cfg(test)]
mod testing;

pub use moderation::{DEFAULT_PER_PAGE, Moderation, PublishReport, ReviewPage};
pub use sweeps::{
    DiscoveryReport, EnrichReport, ScanReport, SilentProgress, SweepProgress, discover_topics,
    enrich_tasks, scan_feeds,
};
