//! Topic feed item parsing.
//!
//! Each field is extracted independently. A missing element only drops its own
//! field; the rest of the item is still read. The upvote count is the one
//! gate: an item whose count is missing, unparseable, or not above the
//! threshold is skipped as a whole.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use storyfeed_shared::{Task, exceeds_threshold};

use crate::count::parse_count;
use crate::dom::{attr, first, non_empty_text, resolve, selector, text_of};

static FEED_ITEM: LazyLock<Selector> = LazyLock::new(|| selector(".feed_item_inner"));
static COUNT: LazyLock<Selector> = LazyLock::new(|| selector(".count"));
static QUESTION_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".question_link"));
static QUESTION_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".rendered_qtext"));
static USER_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".user"));
static USER_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".IdentityNameCredential"));
static AVATAR: LazyLock<Selector> = LazyLock::new(|| selector("img.profile_photo_img"));
static ANSWER_ABSTRACT: LazyLock<Selector> = LazyLock::new(|| selector(".truncated_q_text"));

/// Candidate task fields read from one feed item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub upvote_count: u32,
    pub question_link: Option<String>,
    pub question_text: Option<String>,
    pub user_link: Option<String>,
    pub user_name: Option<String>,
    /// `question_link + "/answer/" + <last path segment of user_link>`.
    pub answer_link: Option<String>,
    pub user_description: Option<String>,
    pub user_avatar_url: Option<String>,
    pub answer_abstract: Option<String>,
}

/// Why a feed item was not turned into a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No count element in the item.
    MissingCount,
    /// Count text was not in a recognized format.
    InvalidCount(String),
    /// Count did not exceed the upvote threshold.
    BelowThreshold(u32),
}

/// Result of parsing a single feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItemOutcome {
    Candidate(FeedItem),
    Skipped(SkipReason),
}

/// Parse every feed item in a rendered topic page, in document order.
pub fn parse_feed(html: &str, base: &Url) -> Vec<FeedItemOutcome> {
    let doc = Html::parse_document(html);
    doc.select(&FEED_ITEM)
        .map(|item| parse_feed_item(item, base))
        .collect()
}

/// Parse a standalone feed item fragment (the item's own markup).
pub fn parse_feed_item_fragment(fragment: &str, base: &Url) -> FeedItemOutcome {
    let doc = Html::parse_fragment(fragment);
    let root = doc
        .select(&FEED_ITEM)
        .next()
        .unwrap_or_else(|| doc.root_element());
    parse_feed_item(root, base)
}

/// Parse one feed item element.
pub fn parse_feed_item(item: ElementRef<'_>, base: &Url) -> FeedItemOutcome {
    let upvote_count = match first(item, &COUNT) {
        None => return FeedItemOutcome::Skipped(SkipReason::MissingCount),
        Some(el) => {
            let raw = text_of(el);
            match parse_count(&raw) {
                Ok(count) => count,
                Err(_) => return FeedItemOutcome::Skipped(SkipReason::InvalidCount(raw)),
            }
        }
    };
    if !exceeds_threshold(upvote_count) {
        return FeedItemOutcome::Skipped(SkipReason::BelowThreshold(upvote_count));
    }

    let question = first(item, &QUESTION_LINK);
    let question_link = question
        .and_then(|q| attr(q, "href"))
        .and_then(|href| resolve(base, &href));
    let question_text = question.and_then(|q| {
        first(q, &QUESTION_TEXT)
            .and_then(non_empty_text)
            .or_else(|| non_empty_text(q))
    });

    let user = first(item, &USER_LINK);
    let user_link = user
        .and_then(|u| attr(u, "href"))
        .and_then(|href| resolve(base, &href));
    let user_name = user.and_then(non_empty_text);

    let answer_link = match (&question_link, &user_link) {
        (Some(q), Some(u)) => derive_answer_link(q, u),
        _ => None,
    };

    let user_description = first(item, &USER_DESCRIPTION).and_then(non_empty_text);
    let user_avatar_url = first(item, &AVATAR)
        .and_then(|img| attr(img, "src"))
        .and_then(|src| resolve(base, &src));
    let answer_abstract = first(item, &ANSWER_ABSTRACT).and_then(non_empty_text);

    FeedItemOutcome::Candidate(FeedItem {
        upvote_count,
        question_link,
        question_text,
        user_link,
        user_name,
        answer_link,
        user_description,
        user_avatar_url,
        answer_abstract,
    })
}

/// `…/What-is-Rust` + `…/profile/Jane-Doe` -> `…/What-is-Rust/answer/Jane-Doe`.
pub fn derive_answer_link(question_link: &str, user_link: &str) -> Option<String> {
    let slug = user_link.trim_end_matches('/').rsplit('/').next()?;
    if slug.is_empty() {
        return None;
    }
    Some(format!(
        "{}/answer/{slug}",
        question_link.trim_end_matches('/')
    ))
}

impl FeedItem {
    /// Build a raw task, stamped with the topic it was sighted under.
    ///
    /// Returns `None` when the fields that make up the task key are missing.
    pub fn into_task(self, topic: Option<&str>) -> Option<Task> {
        let answer_link = self.answer_link?;
        let question_link = self.question_link?;
        let user_link = self.user_link?;

        let mut task = Task::new(
            answer_link,
            self.question_text.unwrap_or_default(),
            question_link,
            self.upvote_count,
            user_link,
        );
        task.topic = topic.map(String::from);
        task.user_name = self.user_name;
        task.user_description = self.user_description;
        task.user_avatar_url = self.user_avatar_url;
        task.answer_abstract = self.answer_abstract;
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyfeed_shared::TaskStatus;

    fn base() -> Url {
        Url::parse("https://www.example.com").unwrap()
    }

    fn item(count: &str) -> String {
        format!(
            r#"<div class="feed_item_inner">
                <a class="question_link" href="https://www.example.com/What-is-Rust">
                    <span class="rendered_qtext">What is Rust?</span>
                </a>
                <a class="user" href="https://www.example.com/profile/Jane-Doe">Jane Doe</a>
                <span class="IdentityNameCredential">Systems programmer</span>
                <img class="profile_photo_img" src="/avatars/jane.png">
                <div class="truncated_q_text">Rust is a systems language…</div>
                <span class="count">{count}</span>
            </div>"#
        )
    }

    fn candidate(outcome: FeedItemOutcome) -> FeedItem {
        match outcome {
            FeedItemOutcome::Candidate(item) => item,
            FeedItemOutcome::Skipped(reason) => panic!("expected candidate, skipped: {reason:?}"),
        }
    }

    #[test]
    fn full_item_with_k_count() {
        let parsed = candidate(parse_feed_item_fragment(&item("1.2k"), &base()));

        assert_eq!(parsed.upvote_count, 1200);
        assert_eq!(
            parsed.question_link.as_deref(),
            Some("https://www.example.com/What-is-Rust")
        );
        assert_eq!(parsed.question_text.as_deref(), Some("What is Rust?"));
        assert_eq!(
            parsed.answer_link.as_deref(),
            Some("https://www.example.com/What-is-Rust/answer/Jane-Doe")
        );
        assert_eq!(parsed.user_name.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.user_description.as_deref(), Some("Systems programmer"));
        assert_eq!(
            parsed.user_avatar_url.as_deref(),
            Some("https://www.example.com/avatars/jane.png")
        );
        assert_eq!(
            parsed.answer_abstract.as_deref(),
            Some("Rust is a systems language…")
        );
    }

    #[test]
    fn answer_link_is_question_plus_user_slug() {
        let parsed = candidate(parse_feed_item_fragment(&item("1.2k"), &base()));
        let question_link = parsed.question_link.clone().unwrap();
        assert_eq!(
            parsed.answer_link.unwrap(),
            format!("{question_link}/answer/Jane-Doe")
        );
    }

    #[test]
    fn threshold_boundaries() {
        assert_eq!(
            parse_feed_item_fragment(&item("499"), &base()),
            FeedItemOutcome::Skipped(SkipReason::BelowThreshold(499))
        );
        assert_eq!(
            parse_feed_item_fragment(&item("500"), &base()),
            FeedItemOutcome::Skipped(SkipReason::BelowThreshold(500))
        );
        assert_eq!(candidate(parse_feed_item_fragment(&item("501"), &base())).upvote_count, 501);
    }

    #[test]
    fn missing_or_invalid_count_skips_item() {
        let no_count = r#"<div class="feed_item_inner">
            <a class="question_link" href="/q"><span class="rendered_qtext">Q</span></a>
        </div>"#;
        assert_eq!(
            parse_feed_item_fragment(no_count, &base()),
            FeedItemOutcome::Skipped(SkipReason::MissingCount)
        );
        assert_eq!(
            parse_feed_item_fragment(&item("lots"), &base()),
            FeedItemOutcome::Skipped(SkipReason::InvalidCount("lots".into()))
        );
    }

    #[test]
    fn missing_fields_are_omitted_independently() {
        let html = r#"<div class="feed_item_inner">
            <a class="question_link" href="/What-is-Rust"><span class="rendered_qtext">What is Rust?</span></a>
            <span class="count">2k</span>
        </div>"#;
        let parsed = candidate(parse_feed_item_fragment(html, &base()));

        assert_eq!(parsed.upvote_count, 2000);
        assert_eq!(parsed.question_text.as_deref(), Some("What is Rust?"));
        assert_eq!(
            parsed.question_link.as_deref(),
            Some("https://www.example.com/What-is-Rust")
        );
        assert_eq!(parsed.user_link, None);
        assert_eq!(parsed.answer_link, None);
        assert_eq!(parsed.user_description, None);
        assert_eq!(parsed.user_avatar_url, None);
        assert_eq!(parsed.answer_abstract, None);
    }

    #[test]
    fn user_link_with_trailing_slash() {
        assert_eq!(
            derive_answer_link("https://x.com/Q", "https://x.com/profile/Jane-Doe/").as_deref(),
            Some("https://x.com/Q/answer/Jane-Doe")
        );
    }

    #[test]
    fn parses_feed_fixture() {
        let html = std::fs::read_to_string("../../../fixtures/html/topic_feed.html")
            .expect("read feed fixture");
        let outcomes = parse_feed(&html, &base());

        assert_eq!(outcomes.len(), 4);
        let candidates: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                FeedItemOutcome::Candidate(item) => Some(item),
                FeedItemOutcome::Skipped(_) => None,
            })
            .collect();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].upvote_count, 1200);
        assert_eq!(candidates[1].upvote_count, 3400);
        assert!(outcomes.contains(&FeedItemOutcome::Skipped(SkipReason::BelowThreshold(499))));
        assert!(outcomes.contains(&FeedItemOutcome::Skipped(SkipReason::MissingCount)));
    }

    #[test]
    fn into_task_requires_key_fields() {
        let parsed = candidate(parse_feed_item_fragment(&item("1.2k"), &base()));
        let task = parsed.clone().into_task(Some("Technology")).expect("task");
        assert_eq!(task.answer_link, "https://www.example.com/What-is-Rust/answer/Jane-Doe");
        assert_eq!(task.upvote_count, 1200);
        assert_eq!(task.topic.as_deref(), Some("Technology"));
        assert_eq!(task.status, TaskStatus::Default);
        assert!(task.content_html.is_none());

        let keyless = FeedItem {
            user_link: None,
            answer_link: None,
            ..parsed
        };
        assert!(keyless.into_task(None).is_none());
    }
}
