//! Editorial review: list tasks by status, set status, publish.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use storyfeed_shared::{Result, Story, StoryFeedError, Task, TaskStatus};
use storyfeed_storage::{Storage, TaskFilter};

/// Default review page size.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// One page of a review listing.
#[derive(Debug)]
pub struct ReviewPage {
    pub tasks: Vec<Task>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Tasks with this status across all pages.
    pub total: u64,
}

impl ReviewPage {
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }
}

/// Outcome of [`Moderation::publish_range`].
#[derive(Debug, Default)]
pub struct PublishReport {
    pub published: Vec<String>,
    /// `(task id, error)` for each approved task that could not be published.
    pub failed: Vec<(String, String)>,
}

/// Moderation operations over a storage handle.
pub struct Moderation<'a> {
    storage: &'a Storage,
}

impl<'a> Moderation<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Page `page` (1-based) of tasks with `status`, newest first.
    pub async fn list(&self, status: TaskStatus, page: u32, per_page: u32) -> Result<ReviewPage> {
        if page == 0 {
            return Err(StoryFeedError::validation("page numbers start at 1"));
        }
        if per_page == 0 {
            return Err(StoryFeedError::validation("per_page must be at least 1"));
        }

        let skip = (page - 1).saturating_mul(per_page);
        let tasks = self
            .storage
            .find_tasks(&TaskFilter::status(status), skip, per_page)
            .await?;
        let total = self.storage.count_tasks(status).await?;

        Ok(ReviewPage {
            tasks,
            page,
            per_page,
            total,
        })
    }

    /// Tasks with `status` dated in `[begin, end)`.
    pub async fn find_by_date_and_status(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        status: TaskStatus,
    ) -> Result<Vec<Task>> {
        self.storage
            .find_tasks_by_date_and_status(begin, end, status)
            .await
    }

    /// Set a task's status from its integer code.
    pub async fn set_status(&self, id: &str, code: i64) -> Result<TaskStatus> {
        self.storage.update_task_status(id, code).await
    }

    /// Copy one approved task to the online store.
    #[instrument(skip(self))]
    pub async fn publish(&self, id: &str) -> Result<Story> {
        self.storage.copy_approved(id).await
    }

    /// Publish every approved task dated in `[begin, end)`.
    ///
    /// A task that fails (for example, approved but never enriched) is
    /// recorded in the report and the rest are still published.
    #[instrument(skip(self), fields(begin = %begin, end = %end))]
    pub async fn publish_range(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PublishReport> {
        let approved = self
            .find_by_date_and_status(begin, end, TaskStatus::Pass)
            .await?;

        let mut report = PublishReport::default();
        for task in approved {
            match self.storage.copy_approved(&task.id).await {
                Ok(_) => report.published.push(task.id),
                Err(e) => {
                    warn!(id = %task.id, answer_link = %task.answer_link, error = %e, "publish failed");
                    report.failed.push((task.id, e.to_string()));
                }
            }
        }

        info!(
            published = report.published.len(),
            failed = report.failed.len(),
            "range published"
        );
        Ok(report)
    }

    /// The published story for `id` if there is one, else what the task
    /// would publish as. Writes nothing and ignores moderation status.
    pub async fn preview(&self, id: &str) -> Result<Story> {
        if let Some(story) = self.storage.get_story(id).await? {
            return Ok(story);
        }
        let task = self
            .storage
            .get_task(id)
            .await?
            .ok_or_else(|| StoryFeedError::NotFound(format!("task {id}")))?;
        Story::project(&task)
    }
}
