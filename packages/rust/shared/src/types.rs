//! Core domain types: topics, raw tasks, moderation status, published stories.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoryFeedError};

/// Minimum engagement a task must strictly exceed to be collected and enriched.
pub const UPVOTE_THRESHOLD: u32 = 500;

/// Whether an upvote count clears [`UPVOTE_THRESHOLD`] (strict `>`).
pub fn exceeds_threshold(upvote_count: u32) -> bool {
    upvote_count > UPVOTE_THRESHOLD
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A named subject area tracked for content discovery. Unique by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Moderation status of a raw task.
///
/// Every value is reachable from every other; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TaskStatus {
    /// Not yet reviewed.
    #[default]
    Default,
    /// Approved by an editor; eligible for publishing.
    Pass,
    /// Rejected by an editor.
    Denial,
}

impl TaskStatus {
    /// All defined statuses.
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Default, TaskStatus::Pass, TaskStatus::Denial];

    /// Stored integer code: `DEFAULT = 0`, `PASS = 1`, `DENIAL = -1`.
    pub fn code(self) -> i64 {
        match self {
            TaskStatus::Default => 0,
            TaskStatus::Pass => 1,
            TaskStatus::Denial => -1,
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = StoryFeedError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(TaskStatus::Default),
            1 => Ok(TaskStatus::Pass),
            -1 => Ok(TaskStatus::Denial),
            other => Err(StoryFeedError::InvalidStatus(other)),
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Default => "default",
            TaskStatus::Pass => "pass",
            TaskStatus::Denial => "denial",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskStatus {
    type Err = StoryFeedError;

    /// Accepts a name (`default`, `pass`, `denial`) or an integer code.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(TaskStatus::Default),
            "pass" => Ok(TaskStatus::Pass),
            "denial" | "deny" => Ok(TaskStatus::Denial),
            other => {
                let code: i64 = other.parse().map_err(|_| {
                    StoryFeedError::validation(format!("unknown status {s:?}"))
                })?;
                TaskStatus::try_from(code)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One author credential line from the answer page (`{main, detail}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorField {
    pub main: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Author credentials keyed by derived field name (e.g. `work_credential`).
pub type AuthorMap = BTreeMap<String, AuthorField>;

/// A candidate question/answer record in the raw stage, keyed by `answer_link`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable record id (UUID v7), kept across overwrites.
    pub id: String,
    /// Unique key: question link + `/answer/` + user slug.
    pub answer_link: String,
    /// Topic the task was sighted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub question_text: String,
    pub question_link: String,
    pub upvote_count: u32,
    pub user_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar_url: Option<String>,
    /// Truncated answer preview shown in the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_abstract: Option<String>,
    /// Full answer markup, filled by the enrichment sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    /// First image in the answer, filled by the enrichment sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar_url: Option<String>,
    pub status: TaskStatus,
    /// When the task was last sighted.
    pub date: DateTime<Utc>,
}

impl Task {
    /// Build a freshly sighted task with a new id, `DEFAULT` status, and no
    /// enrichment content.
    pub fn new(
        answer_link: impl Into<String>,
        question_text: impl Into<String>,
        question_link: impl Into<String>,
        upvote_count: u32,
        user_link: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            answer_link: answer_link.into(),
            topic: None,
            question_text: question_text.into(),
            question_link: question_link.into(),
            upvote_count,
            user_link: user_link.into(),
            user_name: None,
            user_description: None,
            user_avatar_url: None,
            answer_abstract: None,
            content_html: None,
            cover_url: None,
            author: None,
            author_avatar_url: None,
            status: TaskStatus::Default,
            date: Utc::now(),
        }
    }

    /// Eligible for full-content enrichment: above threshold and not yet
    /// enriched. Moderation status plays no part.
    pub fn needs_enrichment(&self) -> bool {
        exceeds_threshold(self.upvote_count) && self.content_html.is_none()
    }
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

/// Author block of a published story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryAuthor {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub avatar_url: Option<String>,
}

/// The published, editorially approved projection of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub content_html: String,
    pub cover_url: Option<String>,
    pub author: StoryAuthor,
    pub source_url: String,
}

impl Story {
    /// Project a task into the published shape.
    ///
    /// Does not check moderation status; callers publishing a story must
    /// require [`TaskStatus::Pass`] themselves. Fails if the task has no
    /// content yet.
    pub fn project(task: &Task) -> Result<Self> {
        let content_html = task.content_html.clone().ok_or_else(|| {
            StoryFeedError::validation(format!(
                "task {} has no content yet ({})",
                task.id, task.answer_link
            ))
        })?;

        let name = task
            .user_name
            .clone()
            .or_else(|| name_from_profile_link(&task.user_link));

        Ok(Self {
            title: task.question_text.clone(),
            content_html,
            cover_url: task.cover_url.clone(),
            author: StoryAuthor {
                name,
                desc: task.user_description.clone(),
                avatar_url: task
                    .author_avatar_url
                    .clone()
                    .or_else(|| task.user_avatar_url.clone()),
            },
            source_url: task.answer_link.clone(),
        })
    }
}

/// `https://host/profile/Jane-Doe` -> `Jane Doe`.
fn name_from_profile_link(link: &str) -> Option<String> {
    let slug = link.trim_end_matches('/').rsplit('/').next()?;
    if slug.is_empty() || slug.contains(':') {
        return None;
    }
    Some(slug.replace('-', " "))
}
