use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{
    AccountMetricRecord, ListVideosFilters, MetricsSummary, Platform, VideoMetricRecord,
    VideoStatus,
};
use std::sync::Arc;

/// Read-side aggregation over the raw snapshot series. Nothing here is
/// stored; the append-only series stays the source of truth and every
/// derived number is recomputed per call.
pub struct MetricsService {
    db: Arc<Database>,
}

impl MetricsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn account_series(
        &self,
        account_id: &str,
        platform: Option<Platform>,
    ) -> AppResult<Vec<AccountMetricRecord>> {
        self.db.list_account_metrics(account_id, platform)
    }

    pub fn video_series(&self, video_id: &str) -> AppResult<Vec<VideoMetricRecord>> {
        self.db.list_video_metrics(video_id)
    }

    /// Latest minus previous follower count for the platform; None until the
    /// series has at least two entries.
    pub fn follower_growth(&self, account_id: &str, platform: Platform) -> AppResult<Option<i64>> {
        let series = self.db.list_account_metrics(account_id, Some(platform))?;
        let len = series.len();
        if len < 2 {
            return Ok(None);
        }
        Ok(Some(series[len - 1].followers - series[len - 2].followers))
    }

    /// Totals and averages across the account's posted videos that have at
    /// least one snapshot, using each video's most recent snapshot. Yields an
    /// all-zero summary when nothing qualifies.
    pub fn account_summary(&self, account_id: &str) -> AppResult<MetricsSummary> {
        let posted = self.db.list_videos(&ListVideosFilters {
            account_id: Some(account_id.to_string()),
            status: Some(VideoStatus::Posted),
            limit: Some(u32::MAX),
            offset: None,
        })?;

        let mut summary = MetricsSummary::default();
        for video in &posted {
            let Some(latest) = self.db.latest_video_metric(&video.id)? else {
                continue;
            };
            summary.total_views += latest.views;
            summary.total_likes += latest.likes;
            summary.total_comments += latest.comments;
            summary.total_shares += latest.shares;
            summary.videos_with_metrics += 1;
        }

        if summary.videos_with_metrics > 0 {
            summary.average_views = summary.total_views as f64 / summary.videos_with_metrics as f64;
        }
        summary.engagement_rate = engagement_rate(
            summary.total_views,
            summary.total_likes,
            summary.total_comments,
            summary.total_shares,
        );
        Ok(summary)
    }
}

/// (likes + comments + shares) / views, zero when there are no views.
pub fn engagement_rate(views: i64, likes: i64, comments: i64, shares: i64) -> f64 {
    if views > 0 {
        (likes + comments + shares) as f64 / views as f64
    } else {
        0.0
    }
}

pub fn metric_engagement_rate(metric: &VideoMetricRecord) -> f64 {
    engagement_rate(metric.views, metric.likes, metric.comments, metric.shares)
}
