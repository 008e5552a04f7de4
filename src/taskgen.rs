use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{CreateTaskPayload, TaskType};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Posted videos whose newest metric snapshot is older than this are due for
/// a refresh reminder.
pub const METRIC_STALENESS_DAYS: i64 = 7;

const GENERATED_TASK_PRIORITY: i64 = 4;

/// Scans an account's posted catalog and synthesizes `metrics_update` tasks
/// for videos with stale or missing metrics. De-duplication is a fresh
/// set-membership query against non-completed tasks on every run, which keeps
/// repeated invocations idempotent without any generation watermark.
pub struct TaskGenerator {
    db: Arc<Database>,
}

impl TaskGenerator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the number of tasks created.
    pub fn generate_metrics_update_tasks(&self, account_id: &str) -> AppResult<usize> {
        self.generate_metrics_update_tasks_at(account_id, Utc::now())
    }

    /// Same pipeline with an explicit "now", so staleness windows can be
    /// tested without waiting a week.
    pub fn generate_metrics_update_tasks_at(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let cutoff = now - Duration::days(METRIC_STALENESS_DAYS);

        let candidates = self.db.list_posted_videos_before(account_id, cutoff)?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let already_targeted = self
            .db
            .pending_task_video_ids(account_id, TaskType::MetricsUpdate)?;

        let mut payloads = Vec::new();
        for video in candidates {
            if already_targeted.contains(&video.id) {
                continue;
            }
            let stale = match self.db.latest_video_metric(&video.id)? {
                None => true,
                Some(metric) => metric.recorded_at < cutoff,
            };
            if !stale {
                continue;
            }
            payloads.push(CreateTaskPayload {
                account_id: account_id.to_string(),
                title: format!("Update metrics for \"{}\"", video.title),
                description: Some(
                    "Numbers for this post are over a week old. Pull the latest \
                     views, likes, comments and shares."
                        .to_string(),
                ),
                task_type: TaskType::MetricsUpdate,
                priority: Some(GENERATED_TASK_PRIORITY),
                due_at: Some(now + Duration::days(1)),
                video_id: Some(video.id),
            });
        }

        if payloads.is_empty() {
            return Ok(0);
        }
        let created = self.db.create_tasks_bulk(payloads)?;
        tracing::info!(
            account_id = %account_id,
            created = created.len(),
            "metrics update tasks generated"
        );
        Ok(created.len())
    }
}
