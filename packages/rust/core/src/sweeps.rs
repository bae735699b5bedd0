//! The three batch sweeps: topic discovery, feed scan, story enrichment.
//!
//! Each sweep is independent and can be re-run at any time. Failures are
//! isolated per topic (feed scan) or per task (enrichment): they are logged
//! with enough context to retry by hand and the sweep moves on.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use storyfeed_crawler::{BrowsingAgent, Fetcher};
use storyfeed_extract::{FeedItemOutcome, parse_feed, parse_full_story};
use storyfeed_shared::{Result, Task};
use storyfeed_storage::{Storage, TaskFilter};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting sweep status.
pub trait SweepProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each unit of work (a topic or a task).
    fn item(&self, detail: &str, current: usize, total: usize);
    /// Called when the sweep completes.
    fn done(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl SweepProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _detail: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &str) {}
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of [`discover_topics`].
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Topics listed on the index page.
    pub topics_found: usize,
    /// Topics not previously stored.
    pub topics_inserted: usize,
    pub elapsed: Duration,
}

/// Result of [`scan_feeds`].
#[derive(Debug, Default)]
pub struct ScanReport {
    pub topics_scanned: usize,
    /// Topics whose feed could not be loaded.
    pub topics_failed: usize,
    /// Feed items seen across all topics.
    pub items_seen: usize,
    /// Items dropped by the count filter or for missing key fields.
    pub items_skipped: usize,
    pub tasks_inserted: usize,
    /// Items that overwrote an already stored task.
    pub tasks_updated: usize,
    /// Upserted tasks the next enrichment sweep will pick up.
    pub awaiting_enrichment: usize,
    pub elapsed: Duration,
}

/// Result of [`enrich_tasks`].
#[derive(Debug, Default)]
pub struct EnrichReport {
    /// Tasks eligible for enrichment at sweep start.
    pub selected: usize,
    pub enriched: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Topic discovery
// ---------------------------------------------------------------------------

/// Load the topic index and store every topic not seen before.
#[instrument(skip_all)]
pub async fn discover_topics(
    agent: &BrowsingAgent,
    storage: &Storage,
    progress: &dyn SweepProgress,
) -> Result<DiscoveryReport> {
    let start = Instant::now();
    progress.phase("Loading topic index");
    let topics = agent.enumerate_topics().await?;

    progress.phase("Storing topics");
    let mut report = DiscoveryReport {
        topics_found: topics.len(),
        ..DiscoveryReport::default()
    };
    for (i, topic) in topics.iter().enumerate() {
        progress.item(&topic.name, i + 1, topics.len());
        if storage.upsert_topic(topic).await? {
            report.topics_inserted += 1;
            info!(name = %topic.name, url = %topic.url, "topic inserted");
        }
    }

    report.elapsed = start.elapsed();
    info!(
        found = report.topics_found,
        inserted = report.topics_inserted,
        duration_ms = report.elapsed.as_millis(),
        "topic discovery completed"
    );
    progress.done(&format!(
        "{} topics found, {} new",
        report.topics_found, report.topics_inserted
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Feed scan
// ---------------------------------------------------------------------------

/// Paginate every stored topic's feed and upsert the candidate tasks.
///
/// A topic whose feed fails to load is logged and skipped. Storage errors
/// abort the sweep.
#[instrument(skip_all, fields(page_count = page_count))]
pub async fn scan_feeds(
    agent: &mut BrowsingAgent,
    storage: &Storage,
    page_count: u32,
    progress: &dyn SweepProgress,
) -> Result<ScanReport> {
    let start = Instant::now();
    let topics = storage.list_topics().await?;
    let base = agent.base_url().clone();
    let mut report = ScanReport::default();

    progress.phase("Scanning topic feeds");
    for (i, topic) in topics.iter().enumerate() {
        progress.item(&topic.name, i + 1, topics.len());
        info!(topic = %topic.name, url = %topic.url, total_page = page_count, "scanning topic feed");

        let html = match agent.load_topic_feed(&topic.url, page_count).await {
            Ok(html) => html,
            Err(e) => {
                warn!(topic = %topic.name, url = %topic.url, error = %e, "topic feed failed");
                report.topics_failed += 1;
                continue;
            }
        };
        report.topics_scanned += 1;

        for outcome in parse_feed(&html, &base) {
            report.items_seen += 1;
            let item = match outcome {
                FeedItemOutcome::Candidate(item) => item,
                FeedItemOutcome::Skipped(reason) => {
                    debug!(topic = %topic.name, ?reason, "feed item skipped");
                    report.items_skipped += 1;
                    continue;
                }
            };
            let Some(task) = item.into_task(Some(&topic.name)) else {
                debug!(topic = %topic.name, "feed item missing question or user link");
                report.items_skipped += 1;
                continue;
            };

            let stored = storage.upsert_task(&task).await?;
            if stored.id == task.id {
                report.tasks_inserted += 1;
            } else {
                report.tasks_updated += 1;
            }
            if stored.needs_enrichment() {
                report.awaiting_enrichment += 1;
            }
            info!(question = %task.question_text, upvote = task.upvote_count, "task upserted");
        }

        info!(topic = %topic.name, "topic feed done");
    }

    report.elapsed = start.elapsed();
    info!(
        topics = report.topics_scanned,
        topics_failed = report.topics_failed,
        items = report.items_seen,
        inserted = report.tasks_inserted,
        updated = report.tasks_updated,
        skipped = report.items_skipped,
        awaiting_enrichment = report.awaiting_enrichment,
        duration_ms = report.elapsed.as_millis(),
        "feed scan completed"
    );
    progress.done(&format!(
        "{} topics scanned, {} new tasks, {} updated",
        report.topics_scanned, report.tasks_inserted, report.tasks_updated
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Fetch and parse the answer page of every eligible task (at most `limit`).
///
/// Eligible means above [`storyfeed_shared::UPVOTE_THRESHOLD`] and without content, in any
/// moderation status. A failure on one task is logged and counted; the sweep continues.
#[instrument(skip_all, fields(limit = limit))]
pub async fn enrich_tasks(
    fetcher: &Fetcher,
    storage: &Storage,
    base: &Url,
    limit: u32,
    progress: &dyn SweepProgress,
) -> Result<EnrichReport> {
    let start = Instant::now();
    progress.phase("Selecting tasks");
    let tasks = storage
        .find_tasks(&TaskFilter::needs_enrichment(), 0, limit)
        .await?;
    let mut report = EnrichReport {
        selected: tasks.len(),
        ..EnrichReport::default()
    };

    progress.phase("Fetching stories");
    for (i, task) in tasks.into_iter().enumerate() {
        progress.item(&task.question_text, i + 1, report.selected);
        let question = task.question_text.clone();
        let upvote = task.upvote_count;
        let answer_link = task.answer_link.clone();

        match enrich_one(fetcher, storage, base, task).await {
            Ok(()) => {
                report.enriched += 1;
                info!(question = %question, upvote, "story enriched");
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    question = %question,
                    upvote,
                    answer_link = %answer_link,
                    error = %e,
                    "story enrichment failed"
                );
            }
        }
    }

    report.elapsed = start.elapsed();
    info!(
        selected = report.selected,
        enriched = report.enriched,
        failed = report.failed,
        duration_ms = report.elapsed.as_millis(),
        "enrichment completed"
    );
    progress.done(&format!(
        "{} stories enriched, {} failed",
        report.enriched, report.failed
    ));
    Ok(report)
}

async fn enrich_one(fetcher: &Fetcher, storage: &Storage, base: &Url, mut task: Task) -> Result<()> {
    let page = fetcher.get(&task.answer_link).await?;
    let story = parse_full_story(&page.body, base)?;

    task.content_html = Some(story.content_html);
    task.cover_url = story.cover_url;
    task.author = story.author;
    task.author_avatar_url = story.author_avatar_url;
    if let Some(count) = story.upvote_count {
        task.upvote_count = count;
    }
    storage.save_task(&task).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFactory, agent, fetcher, test_storage};
    use std::sync::Arc;
    use storyfeed_crawler::RecordingSleeper;
    use storyfeed_shared::{Topic, TaskStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.into(),
            url: format!("https://www.example.com/topic/{name}"),
        }
    }

    #[tokio::test]
    async fn discovery_stores_each_topic_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("sitemap.html")))
            .expect(2)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let sleeper = Arc::new(RecordingSleeper::new());
        let agent = agent(Arc::new(FakeFactory::new("")), sleeper, &server.uri());

        let first = discover_topics(&agent, &storage, &SilentProgress).await.unwrap();
        assert_eq!(first.topics_found, 3);
        assert_eq!(first.topics_inserted, 3);

        let second = discover_topics(&agent, &storage, &SilentProgress).await.unwrap();
        assert_eq!(second.topics_found, 3);
        assert_eq!(second.topics_inserted, 0);

        let stored = storage.list_topics().await.unwrap();
        let names: Vec<&str> = stored.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Technology", "History", "Science"]);
    }

    #[tokio::test]
    async fn scan_turns_feed_items_into_tasks() {
        let storage = test_storage().await;
        storage.upsert_topic(&topic("Technology")).await.unwrap();

        let factory = Arc::new(FakeFactory::new(&fixture("topic_feed.html")));
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut agent = agent(factory.clone(), sleeper.clone(), "https://www.example.com");

        let report = scan_feeds(&mut agent, &storage, 3, &SilentProgress).await.unwrap();
        agent.close().await.unwrap();

        assert_eq!(report.topics_scanned, 1);
        assert_eq!(report.items_seen, 4);
        assert_eq!(report.items_skipped, 2);
        assert_eq!(report.tasks_inserted, 2);
        assert_eq!(report.awaiting_enrichment, 2);
        assert_eq!(sleeper.calls().len(), 3);

        let task = storage
            .get_task_by_answer_link("https://www.example.com/What-is-Rust/answer/Jane-Doe")
            .await
            .unwrap()
            .expect("1.2k task stored");
        assert_eq!(task.upvote_count, 1200);
        assert_eq!(task.question_link, "https://www.example.com/What-is-Rust");
        assert_eq!(task.question_text, "What is Rust?");
        assert_eq!(task.topic.as_deref(), Some("Technology"));
        assert_eq!(task.user_name.as_deref(), Some("Jane Doe"));
        assert_eq!(task.status, TaskStatus::Default);
        assert!(task.content_html.is_none());
    }

    #[tokio::test]
    async fn rescan_overwrites_existing_tasks() {
        let storage = test_storage().await;
        storage.upsert_topic(&topic("Technology")).await.unwrap();
        let factory = Arc::new(FakeFactory::new(&fixture("topic_feed.html")));
        let mut agent = agent(factory.clone(), Arc::new(RecordingSleeper::new()), "https://www.example.com");

        scan_feeds(&mut agent, &storage, 1, &SilentProgress).await.unwrap();
        let report = scan_feeds(&mut agent, &storage, 1, &SilentProgress).await.unwrap();
        agent.close().await.unwrap();

        assert_eq!(report.tasks_inserted, 0);
        assert_eq!(report.tasks_updated, 2);
        assert_eq!(factory.opened(), 1);
        assert_eq!(storage.count_tasks(TaskStatus::Default).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn scan_continues_past_a_failing_topic() {
        let storage = test_storage().await;
        storage.upsert_topic(&topic("Broken")).await.unwrap();
        storage.upsert_topic(&topic("Technology")).await.unwrap();

        let factory = Arc::new(
            FakeFactory::new(&fixture("topic_feed.html")).failing_on("/topic/Broken"),
        );
        let mut agent = agent(factory, Arc::new(RecordingSleeper::new()), "https://www.example.com");
        let report = scan_feeds(&mut agent, &storage, 1, &SilentProgress).await.unwrap();
        // The sweep leaves the session to its caller.
        assert!(agent.has_session());
        agent.close().await.unwrap();
        assert!(!agent.has_session());

        assert_eq!(report.topics_failed, 1);
        assert_eq!(report.topics_scanned, 1);
        assert_eq!(report.tasks_inserted, 2);
    }

    #[tokio::test]
    async fn enrichment_isolates_per_task_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/What-is-Rust/answer/Jane-Doe"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("answer_page.html")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Down/answer/Sam-Lee"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Empty/answer/Alex-Kim"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let uri = server.uri();
        let make = |slug: &str, user: &str, upvotes: u32| {
            Task::new(
                format!("{uri}/{slug}/answer/{user}"),
                format!("{slug}?"),
                format!("{uri}/{slug}"),
                upvotes,
                format!("{uri}/profile/{user}"),
            )
        };
        let good = make("What-is-Rust", "Jane-Doe", 1200);
        let down = make("Down", "Sam-Lee", 900);
        let empty = make("Empty", "Alex-Kim", 700);
        let below = make("Below", "Kim-Park", 500);
        for t in [&good, &down, &empty, &below] {
            storage.upsert_task(t).await.unwrap();
        }

        let sleeper = Arc::new(RecordingSleeper::new());
        let base = Url::parse(&uri).unwrap();
        let report = enrich_tasks(&fetcher(sleeper), &storage, &base, 100, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.enriched, 1);
        assert_eq!(report.failed, 2);

        let enriched = storage.get_task(&good.id).await.unwrap().unwrap();
        assert!(enriched.content_html.unwrap().contains("Rust is a systems programming language"));
        assert_eq!(enriched.upvote_count, 1300);
        let author = enriched.author.unwrap();
        assert_eq!(author.len(), 2);
        assert_eq!(author["work_credential"].main, "Engineer at Acme");
        assert_eq!(
            enriched.author_avatar_url.as_deref(),
            Some("https://img.example.com/jane.png")
        );

        for id in [&down.id, &empty.id] {
            let untouched = storage.get_task(id).await.unwrap().unwrap();
            assert!(untouched.content_html.is_none());
        }

        // Failed tasks stay eligible for the next run.
        let remaining = storage
            .find_tasks(&TaskFilter::needs_enrichment(), 0, 100)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn approved_task_seen_again_is_re_enriched_and_publishable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/What-is-Rust/answer/Jane-Doe"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("answer_page.html")))
            .expect(2)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let uri = server.uri();
        let base = Url::parse(&uri).unwrap();
        let sighting = || {
            Task::new(
                format!("{uri}/What-is-Rust/answer/Jane-Doe"),
                "What is Rust?",
                format!("{uri}/What-is-Rust"),
                1200,
                format!("{uri}/profile/Jane-Doe"),
            )
        };
        let stored = storage.upsert_task(&sighting()).await.unwrap();
        let fetcher = fetcher(Arc::new(RecordingSleeper::new()));

        let first = enrich_tasks(&fetcher, &storage, &base, 100, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.enriched, 1);
        storage.update_task_status(&stored.id, 1).await.unwrap();

        // The feed shows the answer again: content is cleared, approval kept.
        let resighted = storage.upsert_task(&sighting()).await.unwrap();
        assert_eq!(resighted.status, TaskStatus::Pass);
        assert!(resighted.content_html.is_none());

        let second = enrich_tasks(&fetcher, &storage, &base, 100, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(second.selected, 1);
        assert_eq!(second.enriched, 1);

        let task = storage.get_task(&stored.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pass);
        assert_eq!(task.upvote_count, 1300);

        let story = crate::Moderation::new(&storage).publish(&stored.id).await.unwrap();
        assert_eq!(story.title, "What is Rust?");
        assert!(story.content_html.contains("Rust is a systems programming language"));
    }
}
