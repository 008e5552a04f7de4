use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::metrics::MetricsService;
use crate::models::{AccountExport, ListIdeasFilters, ListVideosFilters, VideoExportEntry};
use chrono::Utc;
use std::sync::Arc;

/// Composes the downloadable per-account snapshot: identity, the full video
/// catalog with metric history and notes, the read-side metrics summary, the
/// idea backlog and the streak. Pure reads; empty sub-collections come back
/// as empty lists and a zeroed summary.
pub struct ExportService {
    db: Arc<Database>,
    metrics: MetricsService,
}

impl ExportService {
    pub fn new(db: Arc<Database>) -> Self {
        let metrics = MetricsService::new(db.clone());
        Self { db, metrics }
    }

    pub fn export_account(&self, account_id: &str) -> AppResult<AccountExport> {
        let account = self
            .db
            .get_account(account_id)?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))?;

        let videos = self.db.list_videos(&ListVideosFilters {
            account_id: Some(account_id.to_string()),
            status: None,
            limit: Some(u32::MAX),
            offset: None,
        })?;
        let mut entries = Vec::with_capacity(videos.len());
        for video in videos {
            let metrics = self.db.list_video_metrics(&video.id)?;
            let note = self.db.get_video_note(&video.id)?;
            entries.push(VideoExportEntry {
                video,
                metrics,
                note,
            });
        }

        let metrics_summary = self.metrics.account_summary(account_id)?;
        let ideas = self.db.list_ideas(&ListIdeasFilters {
            account_id: Some(account_id.to_string()),
            limit: Some(u32::MAX),
            ..ListIdeasFilters::default()
        })?;
        let streak = self.db.get_or_create_streak(account_id)?;

        tracing::debug!(account_id = %account_id, videos = entries.len(), "account exported");
        Ok(AccountExport {
            exported_at: Utc::now(),
            account_name: account.name,
            account_type: account.niche,
            videos: entries,
            metrics_summary,
            ideas,
            streak,
        })
    }
}
