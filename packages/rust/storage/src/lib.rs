//! libSQL storage layer for topics, raw tasks, and published stories.
//!
//! The [`Storage`] struct owns three logical stores:
//! - `topics`: discovered topics, unique by URL, insert-only
//! - `tasks`: raw candidates, unique by answer link, overwritten on re-sighting
//! - `online`: published stories copied from approved tasks
//!
//! **Access rules:**
//! - Sweeps and moderation writes: read-write (single writer) via [`Storage::open`]
//! - Review listings: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use storyfeed_shared::{
    AuthorMap, Result, Story, StoryAuthor, StoryFeedError, Task, TaskStatus, Topic,
    UPVOTE_THRESHOLD,
};

/// Columns of `tasks`, in the order [`row_to_task`] reads them.
const TASK_COLUMNS: &str = "id, answer_link, topic, question_text, question_link, upvote_count, \
     user_link, user_name, user_description, user_avatar_url, answer_abstract, content_html, \
     cover_url, author_json, author_avatar_url, status, date";

// ---------------------------------------------------------------------------
// TaskFilter
// ---------------------------------------------------------------------------

/// Task selection: an optional status plus optional extra conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    /// `None` matches every status.
    pub status: Option<TaskStatus>,
    /// Only tasks whose `content_html` is absent.
    pub missing_content: bool,
    /// Only tasks with `upvote_count` strictly greater than this.
    pub min_upvotes_exclusive: Option<u32>,
    /// Only tasks sighted under this topic.
    pub topic: Option<String>,
}

impl TaskFilter {
    /// Match every task with the given status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::any_status()
        }
    }

    /// Match every task.
    pub fn any_status() -> Self {
        Self {
            status: None,
            missing_content: false,
            min_upvotes_exclusive: None,
            topic: None,
        }
    }

    /// The SQL form of [`Task::needs_enrichment`]: above [`UPVOTE_THRESHOLD`]
    /// and without content, whatever the moderation status.
    pub fn needs_enrichment() -> Self {
        Self {
            missing_content: true,
            min_upvotes_exclusive: Some(UPVOTE_THRESHOLD),
            ..Self::any_status()
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoryFeedError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoryFeedError::NotFound(format!(
                "database {} (run `storyfeed initialize` first)",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        StoryFeedError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(StoryFeedError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Topic operations
    // -----------------------------------------------------------------------

    /// Insert a topic. A topic whose URL is already stored is ignored.
    ///
    /// Returns `true` if a new row was written.
    pub async fn upsert_topic(&self, topic: &Topic) -> Result<bool> {
        self.check_writable()?;
        let now = timestamp(&Utc::now());
        let inserted = self
            .conn
            .execute(
                "INSERT INTO topics (name, url, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(url) DO NOTHING",
                params![topic.name.as_str(), topic.url.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        if inserted == 0 {
            debug!(url = %topic.url, "topic already stored");
        }
        Ok(inserted > 0)
    }

    /// All topics, in discovery order.
    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut rows = self
            .conn
            .query("SELECT name, url FROM topics ORDER BY id", params![])
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let mut topics = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            topics.push(Topic {
                name: row
                    .get::<String>(0)
                    .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
                url: row
                    .get::<String>(1)
                    .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
            });
        }
        Ok(topics)
    }

    // -----------------------------------------------------------------------
    // Task operations
    // -----------------------------------------------------------------------

    /// Insert a task, or overwrite the stored task with the same answer link.
    ///
    /// On conflict every field is replaced by the new value, absent optionals
    /// included. Only the stored `id` and moderation `status` survive.
    /// Returns the task as stored.
    pub async fn upsert_task(&self, task: &Task) -> Result<Task> {
        self.check_writable()?;
        let author_json = author_to_json(task.author.as_ref())?;
        let date = timestamp(&task.date);
        let now = timestamp(&Utc::now());

        self.conn
            .execute(
                "INSERT INTO tasks (id, answer_link, topic, question_text, question_link, upvote_count,
                     user_link, user_name, user_description, user_avatar_url, answer_abstract,
                     content_html, cover_url, author_json, author_avatar_url, status, date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(answer_link) DO UPDATE SET
                   topic = excluded.topic,
                   question_text = excluded.question_text,
                   question_link = excluded.question_link,
                   upvote_count = excluded.upvote_count,
                   user_link = excluded.user_link,
                   user_name = excluded.user_name,
                   user_description = excluded.user_description,
                   user_avatar_url = excluded.user_avatar_url,
                   answer_abstract = excluded.answer_abstract,
                   content_html = excluded.content_html,
                   cover_url = excluded.cover_url,
                   author_json = excluded.author_json,
                   author_avatar_url = excluded.author_avatar_url,
                   date = excluded.date,
                   updated_at = excluded.updated_at",
                params![
                    task.id.as_str(),
                    task.answer_link.as_str(),
                    task.topic.as_deref(),
                    task.question_text.as_str(),
                    task.question_link.as_str(),
                    i64::from(task.upvote_count),
                    task.user_link.as_str(),
                    task.user_name.as_deref(),
                    task.user_description.as_deref(),
                    task.user_avatar_url.as_deref(),
                    task.answer_abstract.as_deref(),
                    task.content_html.as_deref(),
                    task.cover_url.as_deref(),
                    author_json.as_deref(),
                    task.author_avatar_url.as_deref(),
                    task.status.code(),
                    date.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        self.get_task_by_answer_link(&task.answer_link)
            .await?
            .ok_or_else(|| StoryFeedError::Storage(format!("task vanished: {}", task.answer_link)))
    }

    /// Persist every field of an existing task except its moderation status.
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        self.check_writable()?;
        let author_json = author_to_json(task.author.as_ref())?;
        let date = timestamp(&task.date);
        let now = timestamp(&Utc::now());

        let updated = self
            .conn
            .execute(
                "UPDATE tasks SET
                   answer_link = ?2, topic = ?3, question_text = ?4, question_link = ?5,
                   upvote_count = ?6, user_link = ?7, user_name = ?8, user_description = ?9,
                   user_avatar_url = ?10, answer_abstract = ?11, content_html = ?12,
                   cover_url = ?13, author_json = ?14, author_avatar_url = ?15,
                   date = ?16, updated_at = ?17
                 WHERE id = ?1",
                params![
                    task.id.as_str(),
                    task.answer_link.as_str(),
                    task.topic.as_deref(),
                    task.question_text.as_str(),
                    task.question_link.as_str(),
                    i64::from(task.upvote_count),
                    task.user_link.as_str(),
                    task.user_name.as_deref(),
                    task.user_description.as_deref(),
                    task.user_avatar_url.as_deref(),
                    task.answer_abstract.as_deref(),
                    task.content_html.as_deref(),
                    task.cover_url.as_deref(),
                    author_json.as_deref(),
                    task.author_avatar_url.as_deref(),
                    date.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        if updated == 0 {
            return Err(StoryFeedError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    /// Get a task by id.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        self.query_one_task(&sql, id).await
    }

    /// Get a task by its answer link.
    pub async fn get_task_by_answer_link(&self, answer_link: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE answer_link = ?1");
        self.query_one_task(&sql, answer_link).await
    }

    async fn query_one_task(&self, sql: &str, key: &str) -> Result<Option<Task>> {
        let mut rows = self
            .conn
            .query(sql, params![key])
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_task(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoryFeedError::Storage(e.to_string())),
        }
    }

    /// Tasks matching `filter`, newest first, paginated by `skip`/`limit`.
    pub async fn find_tasks(&self, filter: &TaskFilter, skip: u32, limit: u32) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 = 0 OR content_html IS NULL)
               AND (?3 IS NULL OR upvote_count > ?3)
               AND (?4 IS NULL OR topic = ?4)
             ORDER BY date DESC, id DESC
             LIMIT ?5 OFFSET ?6"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![
                    filter.status.map(TaskStatus::code),
                    i64::from(filter.missing_content),
                    filter.min_upvotes_exclusive.map(i64::from),
                    filter.topic.as_deref(),
                    i64::from(limit),
                    i64::from(skip),
                ],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Number of tasks with the given status.
    pub async fn count_tasks(&self, status: TaskStatus) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM tasks WHERE status = ?1",
                params![status.code()],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n.max(0) as u64)
                .map_err(|e| StoryFeedError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(StoryFeedError::Storage(e.to_string())),
        }
    }

    /// Tasks with `status` dated in `[begin, end)`, oldest first.
    pub async fn find_tasks_by_date_and_status(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        status: TaskStatus,
    ) -> Result<Vec<Task>> {
        if begin >= end {
            return Err(StoryFeedError::validation(format!(
                "empty date range: {begin} is not before {end}"
            )));
        }

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE status = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date, id"
        );
        let mut rows = self
            .conn
            .query(
                &sql,
                params![
                    status.code(),
                    timestamp(&begin).as_str(),
                    timestamp(&end).as_str(),
                ],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Set a task's moderation status from its integer code.
    ///
    /// Codes outside `{-1, 0, 1}` fail with `InvalidStatus` before anything
    /// is written.
    pub async fn update_task_status(&self, id: &str, status: i64) -> Result<TaskStatus> {
        let status = TaskStatus::try_from(status)?;
        self.check_writable()?;

        let updated = self
            .conn
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.code(), timestamp(&Utc::now()).as_str(), id],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        if updated == 0 {
            return Err(StoryFeedError::NotFound(format!("task {id}")));
        }
        info!(id, %status, "task status updated");
        Ok(status)
    }

    // -----------------------------------------------------------------------
    // Online (published) operations
    // -----------------------------------------------------------------------

    /// Project an approved task into a story and write it to the online
    /// store, replacing any earlier copy.
    pub async fn copy_approved(&self, id: &str) -> Result<Story> {
        self.check_writable()?;
        let task = self
            .get_task(id)
            .await?
            .ok_or_else(|| StoryFeedError::NotFound(format!("task {id}")))?;

        if task.status != TaskStatus::Pass {
            return Err(StoryFeedError::validation(format!(
                "task {id} is {} and cannot be published",
                task.status
            )));
        }

        let story = Story::project(&task)?;
        self.conn
            .execute(
                "INSERT INTO online (id, title, content_html, cover_url, author_name, author_desc,
                     author_avatar_url, source_url, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   content_html = excluded.content_html,
                   cover_url = excluded.cover_url,
                   author_name = excluded.author_name,
                   author_desc = excluded.author_desc,
                   author_avatar_url = excluded.author_avatar_url,
                   source_url = excluded.source_url,
                   published_at = excluded.published_at",
                params![
                    task.id.as_str(),
                    story.title.as_str(),
                    story.content_html.as_str(),
                    story.cover_url.as_deref(),
                    story.author.name.as_deref(),
                    story.author.desc.as_deref(),
                    story.author.avatar_url.as_deref(),
                    story.source_url.as_str(),
                    timestamp(&Utc::now()).as_str(),
                ],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        info!(id, source_url = %story.source_url, "story published");
        Ok(story)
    }

    /// Get a published story by task id.
    pub async fn get_story(&self, id: &str) -> Result<Option<Story>> {
        let mut rows = self
            .conn
            .query(
                "SELECT title, content_html, cover_url, author_name, author_desc,
                        author_avatar_url, source_url
                 FROM online WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(Story {
                title: row
                    .get::<String>(0)
                    .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
                content_html: row
                    .get::<String>(1)
                    .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
                cover_url: row.get::<String>(2).ok(),
                author: StoryAuthor {
                    name: row.get::<String>(3).ok(),
                    desc: row.get::<String>(4).ok(),
                    avatar_url: row.get::<String>(5).ok(),
                },
                source_url: row
                    .get::<String>(6)
                    .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(StoryFeedError::Storage(e.to_string())),
        }
    }
}

/// Fixed-width RFC 3339 so stored dates compare correctly as text.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn author_to_json(author: Option<&AuthorMap>) -> Result<Option<String>> {
    author
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoryFeedError::Storage(format!("author encode failed: {e}")))
}

/// Convert a database row (selected with [`TASK_COLUMNS`]) to a [`Task`].
fn row_to_task(row: &libsql::Row) -> Result<Task> {
    let upvote_count: i64 = row
        .get(5)
        .map_err(|e| StoryFeedError::Storage(e.to_string()))?;
    let status: i64 = row
        .get(15)
        .map_err(|e| StoryFeedError::Storage(e.to_string()))?;
    let author = row
        .get::<String>(13)
        .ok()
        .map(|json| serde_json::from_str::<AuthorMap>(&json))
        .transpose()
        .map_err(|e| StoryFeedError::Storage(format!("invalid author json: {e}")))?;

    Ok(Task {
        id: row
            .get::<String>(0)
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
        answer_link: row
            .get::<String>(1)
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
        topic: row.get::<String>(2).ok(),
        question_text: row
            .get::<String>(3)
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
        question_link: row
            .get::<String>(4)
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
        upvote_count: u32::try_from(upvote_count)
            .map_err(|_| StoryFeedError::Storage(format!("invalid upvote_count: {upvote_count}")))?,
        user_link: row
            .get::<String>(6)
            .map_err(|e| StoryFeedError::Storage(e.to_string()))?,
        user_name: row.get::<String>(7).ok(),
        user_description: row.get::<String>(8).ok(),
        user_avatar_url: row.get::<String>(9).ok(),
        answer_abstract: row.get::<String>(10).ok(),
        content_html: row.get::<String>(11).ok(),
        cover_url: row.get::<String>(12).ok(),
        author,
        author_avatar_url: row.get::<String>(14).ok(),
        status: TaskStatus::try_from(status)?,
        date: {
            let s: String = row
                .get(16)
                .map_err(|e| StoryFeedError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoryFeedError::Storage(format!("invalid date: {e}")))?
        },
    })
}
