use crate::errors::{AppError, AppResult};
use crate::ids::new_id;
use crate::models::{
    AccountMetricRecord, AccountNiche, AccountRecord, ConversationDetail, ConversationRecord,
    CreateAccountPayload, CreateIdeaPayload, CreateTaskPayload, CreateVideoPayload, FolderRecord,
    IdeaRecord, IdeaStatus, ListIdeasFilters, ListTasksFilters, ListVideosFilters, MessageRecord,
    MessageRole, Platform, RecordAccountMetricPayload, RecordVideoMetricPayload,
    SaveVideoNotePayload, StreakRecord, TaskRecord, TaskStatus, TaskType, TrendReportRecord,
    UpdateAccountPayload, UpdateIdeaPayload, UpdateTaskPayload, UpdateVideoPayload, UserSettings,
    VideoMetricRecord, VideoNoteRecord, VideoRecord, VideoStatus,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

static HASHTAG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("valid hashtag regex"));

/// The local persistent store. One connection per process, shared by every
/// service module; entity tables are logically independent and multi-table
/// operations (account onboarding, cascade deletes, bulk task inserts) run
/// inside a single SQLite transaction.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Backing store for tests and ephemeral sessions.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // ─── Accounts ───────────────────────────────────────────────────────────

    pub fn create_account(&self, payload: CreateAccountPayload) -> AppResult<AccountRecord> {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("account name is required".to_string()));
        }

        for seed in payload.initial_metrics.iter().flatten() {
            if seed.followers < 0 {
                return Err(AppError::Validation(
                    "initial follower count must be non-negative".to_string(),
                ));
            }
        }

        let id = new_id();
        let now = Utc::now();
        let platforms_json = serde_json::to_string(&payload.platforms)?;
        let keywords_json = serde_json::to_string(&payload.keywords)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO accounts (id, name, niche, platforms_json, keywords_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                name,
                payload.niche.as_str(),
                platforms_json,
                keywords_json,
                now.to_rfc3339()
            ],
        )?;

        // Onboarding seed snapshots land with the account or not at all.
        for seed in payload.initial_metrics.iter().flatten() {
            tx.execute(
                "INSERT INTO account_metrics (id, account_id, platform, followers, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new_id(),
                    id,
                    seed.platform.as_str(),
                    seed.followers,
                    now.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;

        Ok(AccountRecord {
            id,
            name,
            niche: payload.niche,
            platforms: payload.platforms,
            keywords: payload.keywords,
            created_at: now,
        })
    }

    pub fn get_account(&self, account_id: &str) -> AppResult<Option<AccountRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, niche, platforms_json, keywords_json, created_at
             FROM accounts WHERE id = ?1",
            [account_id],
            parse_account_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_accounts(&self) -> AppResult<Vec<AccountRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, niche, platforms_json, keywords_json, created_at
             FROM accounts ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([], parse_account_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_account(
        &self,
        account_id: &str,
        payload: UpdateAccountPayload,
    ) -> AppResult<AccountRecord> {
        let existing = self
            .get_account(account_id)?
            .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))?;

        let name = match payload.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::Validation("account name is required".to_string()));
            }
            Some(name) => name.trim().to_string(),
            None => existing.name,
        };
        let platforms = payload.platforms.unwrap_or(existing.platforms);
        let keywords = payload.keywords.unwrap_or(existing.keywords);

        let conn = self.lock()?;
        conn.execute(
            "UPDATE accounts SET name = ?1, platforms_json = ?2, keywords_json = ?3 WHERE id = ?4",
            params![
                name,
                serde_json::to_string(&platforms)?,
                serde_json::to_string(&keywords)?,
                account_id
            ],
        )?;

        Ok(AccountRecord {
            id: existing.id,
            name,
            niche: existing.niche,
            platforms,
            keywords,
            created_at: existing.created_at,
        })
    }

    // ─── Videos ─────────────────────────────────────────────────────────────

    pub fn create_video(&self, payload: CreateVideoPayload) -> AppResult<VideoRecord> {
        let title = payload.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("video title is required".to_string()));
        }
        if payload.duration_seconds <= 0 {
            return Err(AppError::Validation(
                "video duration must be a positive number of seconds".to_string(),
            ));
        }

        let id = new_id();
        let now = Utc::now();
        let status = payload.status.unwrap_or(VideoStatus::Planned);
        let hashtags = normalize_hashtags(&payload.hashtags);
        let posted_at = match status {
            VideoStatus::Posted => Some(now),
            _ => None,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO videos (
               id, account_id, title, script, caption, hook, hashtags_json,
               duration_seconds, status, scheduled_at, posted_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                payload.account_id,
                title,
                payload.script,
                payload.caption,
                payload.hook,
                serde_json::to_string(&hashtags)?,
                payload.duration_seconds,
                status.as_str(),
                payload.scheduled_at.map(|at| at.to_rfc3339()),
                posted_at.map(|at| at.to_rfc3339()),
                now.to_rfc3339()
            ],
        )?;

        Ok(VideoRecord {
            id,
            account_id: payload.account_id,
            title,
            script: payload.script,
            caption: payload.caption,
            hook: payload.hook,
            hashtags,
            duration_seconds: payload.duration_seconds,
            status,
            scheduled_at: payload.scheduled_at,
            posted_at,
            created_at: now,
        })
    }

    pub fn get_video(&self, video_id: &str) -> AppResult<Option<VideoRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, title, script, caption, hook, hashtags_json,
                    duration_seconds, status, scheduled_at, posted_at, created_at
             FROM videos WHERE id = ?1",
            [video_id],
            parse_video_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_videos(&self, filters: &ListVideosFilters) -> AppResult<Vec<VideoRecord>> {
        let conn = self.lock()?;
        let mut query = String::from(
            "SELECT id, account_id, title, script, caption, hook, hashtags_json,
                    duration_seconds, status, scheduled_at, posted_at, created_at
             FROM videos WHERE 1 = 1",
        );
        let mut params_vec: Vec<String> = Vec::new();

        if let Some(account_id) = &filters.account_id {
            query.push_str(" AND account_id = ?");
            params_vec.push(account_id.clone());
        }
        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            params_vec.push(status.as_str().to_string());
        }

        query.push_str(" ORDER BY created_at DESC");
        let limit = filters.limit.unwrap_or(100);
        let offset = filters.offset.unwrap_or(0);
        query.push_str(" LIMIT ? OFFSET ?");

        let mut stmt = conn.prepare(&query)?;
        let mut dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        dyn_params.push(&limit);
        dyn_params.push(&offset);

        let rows = stmt
            .query_map(rusqlite::params_from_iter(dyn_params), parse_video_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Posted videos whose posted timestamp is at or before `cutoff`,
    /// the candidate set for metrics-refresh reminders.
    pub fn list_posted_videos_before(
        &self,
        account_id: &str,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<VideoRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, title, script, caption, hook, hashtags_json,
                    duration_seconds, status, scheduled_at, posted_at, created_at
             FROM videos
             WHERE account_id = ?1 AND status = 'posted'
               AND posted_at IS NOT NULL AND posted_at <= ?2
             ORDER BY posted_at ASC",
        )?;
        let rows = stmt
            .query_map(params![account_id, cutoff.to_rfc3339()], parse_video_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_video(
        &self,
        video_id: &str,
        payload: UpdateVideoPayload,
    ) -> AppResult<VideoRecord> {
        let existing = self
            .get_video(video_id)?
            .ok_or_else(|| AppError::NotFound(format!("video {video_id}")))?;

        let title = match payload.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::Validation("video title is required".to_string()));
            }
            Some(title) => title.trim().to_string(),
            None => existing.title,
        };
        if let Some(duration) = payload.duration_seconds {
            if duration <= 0 {
                return Err(AppError::Validation(
                    "video duration must be a positive number of seconds".to_string(),
                ));
            }
        }
        let duration_seconds = payload.duration_seconds.unwrap_or(existing.duration_seconds);
        let script = payload.script.or(existing.script);
        let caption = payload.caption.or(existing.caption);
        let hook = payload.hook.or(existing.hook);
        let hashtags = match payload.hashtags {
            Some(raw) => normalize_hashtags(&raw),
            None => existing.hashtags,
        };
        let status = payload.status.unwrap_or(existing.status);
        let scheduled_at = payload.scheduled_at.or(existing.scheduled_at);
        let mut posted_at = payload.posted_at.or(existing.posted_at);
        if status == VideoStatus::Posted && posted_at.is_none() {
            posted_at = Some(Utc::now());
        }

        let conn = self.lock()?;
        conn.execute(
            "UPDATE videos SET title = ?1, script = ?2, caption = ?3, hook = ?4,
                    hashtags_json = ?5, duration_seconds = ?6, status = ?7,
                    scheduled_at = ?8, posted_at = ?9
             WHERE id = ?10",
            params![
                title,
                script,
                caption,
                hook,
                serde_json::to_string(&hashtags)?,
                duration_seconds,
                status.as_str(),
                scheduled_at.map(|at| at.to_rfc3339()),
                posted_at.map(|at| at.to_rfc3339()),
                video_id
            ],
        )?;

        Ok(VideoRecord {
            id: existing.id,
            account_id: existing.account_id,
            title,
            script,
            caption,
            hook,
            hashtags,
            duration_seconds,
            status,
            scheduled_at,
            posted_at,
            created_at: existing.created_at,
        })
    }

    /// Removes the video together with its metric history and note; tasks
    /// that pointed at it survive with the link cleared.
    pub fn delete_video(&self, video_id: &str) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM videos WHERE id = ?1", [video_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("video {video_id}")));
        }
        tx.execute("DELETE FROM video_metrics WHERE video_id = ?1", [video_id])?;
        tx.execute("DELETE FROM video_notes WHERE video_id = ?1", [video_id])?;
        tx.execute(
            "UPDATE tasks SET video_id = NULL WHERE video_id = ?1",
            [video_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ─── Metric snapshots ───────────────────────────────────────────────────

    pub fn record_video_metric(
        &self,
        payload: RecordVideoMetricPayload,
    ) -> AppResult<VideoMetricRecord> {
        for (label, value) in [
            ("views", payload.views),
            ("likes", payload.likes),
            ("comments", payload.comments),
            ("shares", payload.shares),
        ] {
            if value < 0 {
                return Err(AppError::Validation(format!(
                    "{label} must be non-negative"
                )));
            }
        }

        let id = new_id();
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO video_metrics (id, video_id, platform, views, likes, comments, shares, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                payload.video_id,
                payload.platform.as_str(),
                payload.views,
                payload.likes,
                payload.comments,
                payload.shares,
                now.to_rfc3339()
            ],
        )?;

        Ok(VideoMetricRecord {
            id,
            video_id: payload.video_id,
            platform: payload.platform,
            views: payload.views,
            likes: payload.likes,
            comments: payload.comments,
            shares: payload.shares,
            recorded_at: now,
        })
    }

    /// Full append-only series for a video, oldest first.
    pub fn list_video_metrics(&self, video_id: &str) -> AppResult<Vec<VideoMetricRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, video_id, platform, views, likes, comments, shares, recorded_at
             FROM video_metrics WHERE video_id = ?1 ORDER BY recorded_at ASC",
        )?;
        let rows = stmt
            .query_map([video_id], parse_video_metric_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent snapshot for a video across every platform.
    pub fn latest_video_metric(&self, video_id: &str) -> AppResult<Option<VideoMetricRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, video_id, platform, views, likes, comments, shares, recorded_at
             FROM video_metrics WHERE video_id = ?1
             ORDER BY recorded_at DESC LIMIT 1",
            [video_id],
            parse_video_metric_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn record_account_metric(
        &self,
        payload: RecordAccountMetricPayload,
    ) -> AppResult<AccountMetricRecord> {
        if payload.followers < 0 {
            return Err(AppError::Validation(
                "followers must be non-negative".to_string(),
            ));
        }

        let id = new_id();
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO account_metrics (
               id, account_id, platform, followers, reach, impressions, profile_views,
               engagement_rate, total_views, total_likes, total_comments, total_shares, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id,
                payload.account_id,
                payload.platform.as_str(),
                payload.followers,
                payload.reach,
                payload.impressions,
                payload.profile_views,
                payload.engagement_rate,
                payload.total_views,
                payload.total_likes,
                payload.total_comments,
                payload.total_shares,
                now.to_rfc3339()
            ],
        )?;

        Ok(AccountMetricRecord {
            id,
            account_id: payload.account_id,
            platform: payload.platform,
            followers: payload.followers,
            reach: payload.reach,
            impressions: payload.impressions,
            profile_views: payload.profile_views,
            engagement_rate: payload.engagement_rate,
            total_views: payload.total_views,
            total_likes: payload.total_likes,
            total_comments: payload.total_comments,
            total_shares: payload.total_shares,
            recorded_at: now,
        })
    }

    /// Time-ordered snapshot series, optionally narrowed to one platform.
    pub fn list_account_metrics(
        &self,
        account_id: &str,
        platform: Option<Platform>,
    ) -> AppResult<Vec<AccountMetricRecord>> {
        let conn = self.lock()?;
        let rows = match platform {
            Some(platform) => {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, platform, followers, reach, impressions, profile_views,
                            engagement_rate, total_views, total_likes, total_comments, total_shares, recorded_at
                     FROM account_metrics
                     WHERE account_id = ?1 AND platform = ?2
                     ORDER BY recorded_at ASC",
                )?;
                let out = stmt
                    .query_map(
                        params![account_id, platform.as_str()],
                        parse_account_metric_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                out
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, platform, followers, reach, impressions, profile_views,
                            engagement_rate, total_views, total_likes, total_comments, total_shares, recorded_at
                     FROM account_metrics
                     WHERE account_id = ?1
                     ORDER BY recorded_at ASC",
                )?;
                let out = stmt
                    .query_map([account_id], parse_account_metric_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                out
            }
        };
        Ok(rows)
    }

    /// Test hook: rewrites a snapshot's recorded timestamp so staleness
    /// windows can be exercised without waiting out the clock.
    #[cfg(test)]
    pub(crate) fn backdate_video_metric(
        &self,
        metric_id: &str,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE video_metrics SET recorded_at = ?1 WHERE id = ?2",
            params![recorded_at.to_rfc3339(), metric_id],
        )?;
        Ok(())
    }

    // ─── Folders ────────────────────────────────────────────────────────────

    pub fn create_folder(&self, account_id: &str, name: &str) -> AppResult<FolderRecord> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("folder name is required".to_string()));
        }

        let id = new_id();
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO folders (id, account_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, account_id, name, now.to_rfc3339()],
        )?;

        Ok(FolderRecord {
            id,
            account_id: account_id.to_string(),
            name,
            created_at: now,
        })
    }

    pub fn get_folder(&self, folder_id: &str) -> AppResult<Option<FolderRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, name, created_at FROM folders WHERE id = ?1",
            [folder_id],
            parse_folder_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_folders(&self, account_id: &str) -> AppResult<Vec<FolderRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, name, created_at
             FROM folders WHERE account_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([account_id], parse_folder_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn rename_folder(&self, folder_id: &str, name: &str) -> AppResult<FolderRecord> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("folder name is required".to_string()));
        }
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE folders SET name = ?1 WHERE id = ?2",
            params![name, folder_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("folder {folder_id}")));
        }
        drop(conn);
        self.get_folder(folder_id)?
            .ok_or_else(|| AppError::NotFound(format!("folder {folder_id}")))
    }

    /// Ideas filed under the folder survive; only the grouping is removed.
    pub fn delete_folder(&self, folder_id: &str) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM folders WHERE id = ?1", [folder_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("folder {folder_id}")));
        }
        tx.execute(
            "UPDATE ideas SET folder_id = NULL WHERE folder_id = ?1",
            [folder_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ─── Ideas ──────────────────────────────────────────────────────────────

    pub fn create_idea(&self, payload: CreateIdeaPayload) -> AppResult<IdeaRecord> {
        let title = payload.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("idea title is required".to_string()));
        }
        let priority = payload.priority.unwrap_or(3);
        if !(1..=5).contains(&priority) {
            return Err(AppError::Validation(
                "idea priority must be between 1 and 5".to_string(),
            ));
        }

        let id = new_id();
        let now = Utc::now();
        let status = payload.status.unwrap_or(IdeaStatus::New);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ideas (id, account_id, folder_id, title, description, priority, status, tags_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                payload.account_id,
                payload.folder_id,
                title,
                payload.description,
                priority,
                status.as_str(),
                serde_json::to_string(&payload.tags)?,
                now.to_rfc3339()
            ],
        )?;

        Ok(IdeaRecord {
            id,
            account_id: payload.account_id,
            folder_id: payload.folder_id,
            title,
            description: payload.description,
            priority,
            status,
            tags: payload.tags,
            created_at: now,
        })
    }

    pub fn get_idea(&self, idea_id: &str) -> AppResult<Option<IdeaRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, folder_id, title, description, priority, status, tags_json, created_at
             FROM ideas WHERE id = ?1",
            [idea_id],
            parse_idea_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_ideas(&self, filters: &ListIdeasFilters) -> AppResult<Vec<IdeaRecord>> {
        let conn = self.lock()?;
        let mut query = String::from(
            "SELECT id, account_id, folder_id, title, description, priority, status, tags_json, created_at
             FROM ideas WHERE 1 = 1",
        );
        let mut params_vec: Vec<String> = Vec::new();

        if let Some(account_id) = &filters.account_id {
            query.push_str(" AND account_id = ?");
            params_vec.push(account_id.clone());
        }
        if let Some(folder_id) = &filters.folder_id {
            query.push_str(" AND folder_id = ?");
            params_vec.push(folder_id.clone());
        }
        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            params_vec.push(status.as_str().to_string());
        }

        query.push_str(" ORDER BY priority DESC, created_at DESC");
        let limit = filters.limit.unwrap_or(100);
        let offset = filters.offset.unwrap_or(0);
        query.push_str(" LIMIT ? OFFSET ?");

        let mut stmt = conn.prepare(&query)?;
        let mut dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        dyn_params.push(&limit);
        dyn_params.push(&offset);

        let rows = stmt
            .query_map(rusqlite::params_from_iter(dyn_params), parse_idea_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_idea(&self, idea_id: &str, payload: UpdateIdeaPayload) -> AppResult<IdeaRecord> {
        let existing = self
            .get_idea(idea_id)?
            .ok_or_else(|| AppError::NotFound(format!("idea {idea_id}")))?;

        let title = match payload.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::Validation("idea title is required".to_string()));
            }
            Some(title) => title.trim().to_string(),
            None => existing.title,
        };
        let priority = payload.priority.unwrap_or(existing.priority);
        if !(1..=5).contains(&priority) {
            return Err(AppError::Validation(
                "idea priority must be between 1 and 5".to_string(),
            ));
        }
        // Outer None leaves the folder untouched, Some(None) unfiles the idea.
        let folder_id = match payload.folder_id {
            Some(folder_id) => folder_id,
            None => existing.folder_id,
        };
        let description = payload.description.or(existing.description);
        let status = payload.status.unwrap_or(existing.status);
        let tags = payload.tags.unwrap_or(existing.tags);

        let conn = self.lock()?;
        conn.execute(
            "UPDATE ideas SET folder_id = ?1, title = ?2, description = ?3, priority = ?4,
                    status = ?5, tags_json = ?6
             WHERE id = ?7",
            params![
                folder_id,
                title,
                description,
                priority,
                status.as_str(),
                serde_json::to_string(&tags)?,
                idea_id
            ],
        )?;

        Ok(IdeaRecord {
            id: existing.id,
            account_id: existing.account_id,
            folder_id,
            title,
            description,
            priority,
            status,
            tags,
            created_at: existing.created_at,
        })
    }

    pub fn delete_idea(&self, idea_id: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM ideas WHERE id = ?1", [idea_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("idea {idea_id}")));
        }
        Ok(())
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    pub fn create_task(&self, payload: CreateTaskPayload) -> AppResult<TaskRecord> {
        let record = build_task_record(payload)?;
        let conn = self.lock()?;
        insert_task_row(&conn, &record)?;
        Ok(record)
    }

    /// Pipeline entry point: every task lands or none does.
    pub fn create_tasks_bulk(&self, payloads: Vec<CreateTaskPayload>) -> AppResult<Vec<TaskRecord>> {
        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            records.push(build_task_record(payload)?);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in &records {
            insert_task_row(&tx, record)?;
        }
        tx.commit()?;
        Ok(records)
    }

    pub fn get_task(&self, task_id: &str) -> AppResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, title, description, task_type, priority, status,
                    due_at, video_id, completed_at, created_at
             FROM tasks WHERE id = ?1",
            [task_id],
            parse_task_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_tasks(&self, filters: &ListTasksFilters) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut query = String::from(
            "SELECT id, account_id, title, description, task_type, priority, status,
                    due_at, video_id, completed_at, created_at
             FROM tasks WHERE 1 = 1",
        );
        let mut params_vec: Vec<String> = Vec::new();

        if let Some(account_id) = &filters.account_id {
            query.push_str(" AND account_id = ?");
            params_vec.push(account_id.clone());
        }
        if let Some(task_type) = filters.task_type {
            query.push_str(" AND task_type = ?");
            params_vec.push(task_type.as_str().to_string());
        }
        if let Some(status) = filters.status {
            query.push_str(" AND status = ?");
            params_vec.push(status.as_str().to_string());
        }
        if let Some(video_id) = &filters.video_id {
            query.push_str(" AND video_id = ?");
            params_vec.push(video_id.clone());
        }

        query.push_str(" ORDER BY priority DESC, created_at DESC");
        let limit = filters.limit.unwrap_or(100);
        let offset = filters.offset.unwrap_or(0);
        query.push_str(" LIMIT ? OFFSET ?");

        let mut stmt = conn.prepare(&query)?;
        let mut dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        dyn_params.push(&limit);
        dyn_params.push(&offset);

        let rows = stmt
            .query_map(rusqlite::params_from_iter(dyn_params), parse_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Video ids already targeted by a non-completed task of the given type
    /// for this account. Queried fresh on every pipeline run.
    pub fn pending_task_video_ids(
        &self,
        account_id: &str,
        task_type: TaskType,
    ) -> AppResult<HashSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id FROM tasks
             WHERE account_id = ?1 AND task_type = ?2 AND status != 'completed'
               AND video_id IS NOT NULL",
        )?;
        let mut rows = stmt.query(params![account_id, task_type.as_str()])?;
        let mut ids = HashSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get::<_, String>(0)?);
        }
        Ok(ids)
    }

    pub fn update_task(&self, task_id: &str, payload: UpdateTaskPayload) -> AppResult<TaskRecord> {
        let existing = self
            .get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))?;

        let title = match payload.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::Validation("task title is required".to_string()));
            }
            Some(title) => title.trim().to_string(),
            None => existing.title,
        };
        let description = payload.description.or(existing.description);
        let priority = payload.priority.unwrap_or(existing.priority);
        let status = payload.status.unwrap_or(existing.status);
        let due_at = payload.due_at.or(existing.due_at);
        let completed_at = match (existing.status, status) {
            (TaskStatus::Pending, TaskStatus::Completed) => Some(Utc::now()),
            (_, TaskStatus::Pending) => None,
            _ => existing.completed_at,
        };

        let conn = self.lock()?;
        conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, status = ?4,
                    due_at = ?5, completed_at = ?6
             WHERE id = ?7",
            params![
                title,
                description,
                priority,
                status.as_str(),
                due_at.map(|at| at.to_rfc3339()),
                completed_at.map(|at| at.to_rfc3339()),
                task_id
            ],
        )?;

        Ok(TaskRecord {
            id: existing.id,
            account_id: existing.account_id,
            title,
            description,
            task_type: existing.task_type,
            priority,
            status,
            due_at,
            video_id: existing.video_id,
            completed_at,
            created_at: existing.created_at,
        })
    }

    pub fn complete_task(&self, task_id: &str) -> AppResult<TaskRecord> {
        self.update_task(
            task_id,
            UpdateTaskPayload {
                status: Some(TaskStatus::Completed),
                ..UpdateTaskPayload::default()
            },
        )
    }

    /// "Snooze": push the due date forward without touching anything else.
    pub fn snooze_task(&self, task_id: &str, until: DateTime<Utc>) -> AppResult<TaskRecord> {
        self.update_task(
            task_id,
            UpdateTaskPayload {
                due_at: Some(until),
                ..UpdateTaskPayload::default()
            },
        )
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }

    // ─── Streaks ────────────────────────────────────────────────────────────

    /// Reads the streak for an account, materializing an all-zero row the
    /// first time. Streaks are account-id-keyed with no foreign-key check,
    /// so this works even before the account row exists.
    pub fn get_or_create_streak(&self, account_id: &str) -> AppResult<StreakRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO streaks (account_id, current_streak, longest_streak, last_activity_at, xp_total)
             VALUES (?1, 0, 0, NULL, 0)",
            [account_id],
        )?;
        conn.query_row(
            "SELECT account_id, current_streak, longest_streak, last_activity_at, xp_total
             FROM streaks WHERE account_id = ?1",
            [account_id],
            parse_streak_row,
        )
        .map_err(AppError::from)
    }

    pub fn save_streak(&self, streak: &StreakRecord) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO streaks (account_id, current_streak, longest_streak, last_activity_at, xp_total)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(account_id) DO UPDATE SET
               current_streak = excluded.current_streak,
               longest_streak = excluded.longest_streak,
               last_activity_at = excluded.last_activity_at,
               xp_total = excluded.xp_total",
            params![
                streak.account_id,
                streak.current_streak,
                streak.longest_streak,
                streak.last_activity_at.map(|at| at.to_rfc3339()),
                streak.xp_total
            ],
        )?;
        Ok(())
    }

    // ─── Video notes ────────────────────────────────────────────────────────

    pub fn save_video_note(
        &self,
        video_id: &str,
        payload: SaveVideoNotePayload,
    ) -> AppResult<VideoNoteRecord> {
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO video_notes (video_id, what_worked, what_to_improve, next_experiment, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(video_id) DO UPDATE SET
               what_worked = COALESCE(excluded.what_worked, video_notes.what_worked),
               what_to_improve = COALESCE(excluded.what_to_improve, video_notes.what_to_improve),
               next_experiment = COALESCE(excluded.next_experiment, video_notes.next_experiment),
               updated_at = excluded.updated_at",
            params![
                video_id,
                payload.what_worked,
                payload.what_to_improve,
                payload.next_experiment,
                now.to_rfc3339()
            ],
        )?;
        drop(conn);
        self.get_video_note(video_id)?
            .ok_or_else(|| AppError::Internal(format!("video note upsert lost for {video_id}")))
    }

    pub fn get_video_note(&self, video_id: &str) -> AppResult<Option<VideoNoteRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT video_id, what_worked, what_to_improve, next_experiment, updated_at
             FROM video_notes WHERE video_id = ?1",
            [video_id],
            parse_video_note_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    // ─── Trend reports ──────────────────────────────────────────────────────

    pub fn insert_trend_report(
        &self,
        account_id: &str,
        provider: &str,
        content: &serde_json::Value,
    ) -> AppResult<TrendReportRecord> {
        if provider.trim().is_empty() {
            return Err(AppError::Validation(
                "trend report provider is required".to_string(),
            ));
        }

        let id = new_id();
        let now = Utc::now();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO trend_reports (id, account_id, provider, content_json, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                account_id,
                provider,
                serde_json::to_string(content)?,
                now.to_rfc3339()
            ],
        )?;

        Ok(TrendReportRecord {
            id,
            account_id: account_id.to_string(),
            provider: provider.to_string(),
            content: content.clone(),
            generated_at: now,
        })
    }

    pub fn get_trend_report(&self, report_id: &str) -> AppResult<Option<TrendReportRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, provider, content_json, generated_at
             FROM trend_reports WHERE id = ?1",
            [report_id],
            parse_trend_report_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_trend_reports(&self, account_id: &str) -> AppResult<Vec<TrendReportRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, provider, content_json, generated_at
             FROM trend_reports WHERE account_id = ?1 ORDER BY generated_at DESC",
        )?;
        let rows = stmt
            .query_map([account_id], parse_trend_report_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_trend_report(&self, report_id: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM trend_reports WHERE id = ?1", [report_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("trend report {report_id}")));
        }
        Ok(())
    }

    // ─── Conversations ──────────────────────────────────────────────────────

    pub fn create_conversation(
        &self,
        account_id: &str,
        title: Option<&str>,
    ) -> AppResult<ConversationRecord> {
        let id = new_id();
        let now = Utc::now();
        let title = normalize_conversation_title(title.unwrap_or_default());
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversations (id, account_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, account_id, title, now.to_rfc3339()],
        )?;
        Ok(ConversationRecord {
            id,
            account_id: account_id.to_string(),
            title,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_conversation(&self, conversation_id: &str) -> AppResult<Option<ConversationRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, account_id, title, created_at, updated_at
             FROM conversations WHERE id = ?1",
            [conversation_id],
            parse_conversation_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn get_conversation_detail(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationDetail>> {
        let Some(conversation) = self.get_conversation(conversation_id)? else {
            return Ok(None);
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, seq, role, content, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC",
        )?;
        let messages = stmt
            .query_map([conversation_id], parse_message_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(ConversationDetail {
            conversation,
            messages,
        }))
    }

    pub fn list_conversations(&self, account_id: &str) -> AppResult<Vec<ConversationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, title, created_at, updated_at
             FROM conversations WHERE account_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt
            .query_map([account_id], parse_conversation_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<MessageRecord> {
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                "message content is required".to_string(),
            ));
        }

        let id = new_id();
        let now = Utc::now();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: i64 = tx.query_row(
            "SELECT COUNT(1) FROM conversations WHERE id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(AppError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                conversation_id,
                seq,
                role.as_str(),
                content,
                now.to_rfc3339()
            ],
        )?;
        tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), conversation_id],
        )?;
        tx.commit()?;

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_string(),
            seq,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    pub fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> AppResult<ConversationRecord> {
        let normalized = normalize_conversation_title(title);
        let now = Utc::now();
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![normalized, now.to_rfc3339(), conversation_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        drop(conn);
        self.get_conversation(conversation_id)?
            .ok_or_else(|| AppError::NotFound(format!("conversation {conversation_id}")))
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", [conversation_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }
        tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            [conversation_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_user_settings(&self) -> AppResult<UserSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'user'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<UserSettings>(&raw).unwrap_or_default()),
            None => Ok(UserSettings::default()),
        }
    }

    pub fn update_user_settings(&self, update: serde_json::Value) -> AppResult<UserSettings> {
        let current = self.get_user_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: UserSettings = serde_json::from_value(merged)?;
        self.write_user_settings(&settings)?;
        Ok(settings)
    }

    pub fn reset_user_settings(&self) -> AppResult<UserSettings> {
        let settings = UserSettings::default();
        self.write_user_settings(&settings)?;
        Ok(settings)
    }

    fn write_user_settings(&self, settings: &UserSettings) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('user', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(settings)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ─── Row parsing ────────────────────────────────────────────────────────────

fn parse_account_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        niche: parse_niche(&row.get::<_, String>(2)?)?,
        platforms: parse_json_column(&row.get::<_, String>(3)?)?,
        keywords: parse_json_column(&row.get::<_, String>(4)?)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

fn parse_video_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        script: row.get(3)?,
        caption: row.get(4)?,
        hook: row.get(5)?,
        hashtags: parse_json_column(&row.get::<_, String>(6)?)?,
        duration_seconds: row.get(7)?,
        status: parse_video_status(&row.get::<_, String>(8)?)?,
        scheduled_at: row
            .get::<_, Option<String>>(9)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        posted_at: row
            .get::<_, Option<String>>(10)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        created_at: parse_time(&row.get::<_, String>(11)?)?,
    })
}

fn parse_video_metric_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoMetricRecord> {
    Ok(VideoMetricRecord {
        id: row.get(0)?,
        video_id: row.get(1)?,
        platform: parse_platform(&row.get::<_, String>(2)?)?,
        views: row.get(3)?,
        likes: row.get(4)?,
        comments: row.get(5)?,
        shares: row.get(6)?,
        recorded_at: parse_time(&row.get::<_, String>(7)?)?,
    })
}

fn parse_account_metric_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountMetricRecord> {
    Ok(AccountMetricRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        platform: parse_platform(&row.get::<_, String>(2)?)?,
        followers: row.get(3)?,
        reach: row.get(4)?,
        impressions: row.get(5)?,
        profile_views: row.get(6)?,
        engagement_rate: row.get(7)?,
        total_views: row.get(8)?,
        total_likes: row.get(9)?,
        total_comments: row.get(10)?,
        total_shares: row.get(11)?,
        recorded_at: parse_time(&row.get::<_, String>(12)?)?,
    })
}

fn parse_folder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FolderRecord> {
    Ok(FolderRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
    })
}

fn parse_idea_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdeaRecord> {
    Ok(IdeaRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        folder_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority: row.get(5)?,
        status: parse_idea_status(&row.get::<_, String>(6)?)?,
        tags: parse_json_column(&row.get::<_, String>(7)?)?,
        created_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        task_type: parse_task_type(&row.get::<_, String>(4)?)?,
        priority: row.get(5)?,
        status: parse_task_status(&row.get::<_, String>(6)?)?,
        due_at: row
            .get::<_, Option<String>>(7)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        video_id: row.get(8)?,
        completed_at: row
            .get::<_, Option<String>>(9)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        created_at: parse_time(&row.get::<_, String>(10)?)?,
    })
}

fn parse_streak_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreakRecord> {
    Ok(StreakRecord {
        account_id: row.get(0)?,
        current_streak: row.get(1)?,
        longest_streak: row.get(2)?,
        last_activity_at: row
            .get::<_, Option<String>>(3)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        xp_total: row.get(4)?,
    })
}

fn parse_video_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoNoteRecord> {
    Ok(VideoNoteRecord {
        video_id: row.get(0)?,
        what_worked: row.get(1)?,
        what_to_improve: row.get(2)?,
        next_experiment: row.get(3)?,
        updated_at: parse_time(&row.get::<_, String>(4)?)?,
    })
}

fn parse_trend_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrendReportRecord> {
    Ok(TrendReportRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        provider: row.get(2)?,
        content: serde_json::from_str::<serde_json::Value>(&row.get::<_, String>(3)?)
            .unwrap_or(serde_json::json!({})),
        generated_at: parse_time(&row.get::<_, String>(4)?)?,
    })
}

fn parse_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
        updated_at: parse_time(&row.get::<_, String>(4)?)?,
    })
}

fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        seq: row.get(2)?,
        role: parse_role(&row.get::<_, String>(3)?)?,
        content: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

// ─── Column helpers ─────────────────────────────────────────────────────────

fn build_task_record(payload: CreateTaskPayload) -> AppResult<TaskRecord> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("task title is required".to_string()));
    }
    Ok(TaskRecord {
        id: new_id(),
        account_id: payload.account_id,
        title,
        description: payload.description,
        task_type: payload.task_type,
        priority: payload.priority.unwrap_or(3),
        status: TaskStatus::Pending,
        due_at: payload.due_at,
        video_id: payload.video_id,
        completed_at: None,
        created_at: Utc::now(),
    })
}

fn insert_task_row(conn: &Connection, record: &TaskRecord) -> AppResult<()> {
    conn.execute(
        "INSERT INTO tasks (
           id, account_id, title, description, task_type, priority, status,
           due_at, video_id, completed_at, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id,
            record.account_id,
            record.title,
            record.description,
            record.task_type.as_str(),
            record.priority,
            record.status.as_str(),
            record.due_at.map(|at| at.to_rfc3339()),
            record.video_id,
            record.completed_at.map(|at| at.to_rfc3339()),
            record.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Hashtags are stored lowercased without the leading '#', deduplicated but
/// keeping first-seen order.
fn normalize_hashtags(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in raw {
        let lowered = tag.trim().trim_start_matches('#').to_lowercase();
        let cleaned = HASHTAG_CHARS.replace_all(&lowered, "").to_string();
        if cleaned.is_empty() || !seen.insert(cleaned.clone()) {
            continue;
        }
        out.push(cleaned);
    }
    out
}

fn normalize_conversation_title(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return "New chat".to_string();
    }
    let max_chars = 80;
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(max_chars - 1).collect();
    format!("{}...", truncated)
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|error| conversion_error(error.to_string()))
}

fn parse_niche(raw: &str) -> rusqlite::Result<AccountNiche> {
    match raw {
        "fitness" => Ok(AccountNiche::Fitness),
        "beauty" => Ok(AccountNiche::Beauty),
        "finance" => Ok(AccountNiche::Finance),
        "food" => Ok(AccountNiche::Food),
        "travel" => Ok(AccountNiche::Travel),
        "tech" => Ok(AccountNiche::Tech),
        "education" => Ok(AccountNiche::Education),
        "entertainment" => Ok(AccountNiche::Entertainment),
        other => Err(conversion_error(format!("Unknown niche '{}'", other))),
    }
}

fn parse_platform(raw: &str) -> rusqlite::Result<Platform> {
    match raw {
        "short-video" => Ok(Platform::ShortVideo),
        "photo-reel" => Ok(Platform::PhotoReel),
        "story" => Ok(Platform::Story),
        "live" => Ok(Platform::Live),
        other => Err(conversion_error(format!("Unknown platform '{}'", other))),
    }
}

fn parse_video_status(raw: &str) -> rusqlite::Result<VideoStatus> {
    match raw {
        "planned" => Ok(VideoStatus::Planned),
        "filmed" => Ok(VideoStatus::Filmed),
        "edited" => Ok(VideoStatus::Edited),
        "posted" => Ok(VideoStatus::Posted),
        _ => Ok(VideoStatus::Planned),
    }
}

fn parse_idea_status(raw: &str) -> rusqlite::Result<IdeaStatus> {
    match raw {
        "new" => Ok(IdeaStatus::New),
        "in_progress" => Ok(IdeaStatus::InProgress),
        "used" => Ok(IdeaStatus::Used),
        "archived" => Ok(IdeaStatus::Archived),
        _ => Ok(IdeaStatus::New),
    }
}

fn parse_task_type(raw: &str) -> rusqlite::Result<TaskType> {
    match raw {
        "metrics_update" => Ok(TaskType::MetricsUpdate),
        "reminder" => Ok(TaskType::Reminder),
        other => Err(conversion_error(format!("Unknown task type '{}'", other))),
    }
}

fn parse_task_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    match raw {
        "pending" => Ok(TaskStatus::Pending),
        "completed" => Ok(TaskStatus::Completed),
        _ => Ok(TaskStatus::Pending),
    }
}

fn parse_role(raw: &str) -> rusqlite::Result<MessageRole> {
    match raw {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        "system" => Ok(MessageRole::System),
        other => Err(conversion_error(format!("Unknown role '{}'", other))),
    }
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_error(error.to_string()))
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_hashtags, Database};
    use crate::errors::AppError;
    use crate::models::{
        AccountNiche, CreateAccountPayload, CreateIdeaPayload, CreateTaskPayload,
        CreateVideoPayload, InitialPlatformMetric, ListIdeasFilters, ListTasksFilters,
        ListVideosFilters, MessageRole, Platform, RecordVideoMetricPayload, SaveVideoNotePayload,
        TaskType, UpdateVideoPayload, UserSettings, VideoStatus,
    };

    fn test_db() -> Database {
        let dir = tempfile::tempdir().expect("tempdir");
        Database::new(&dir.path().join("planner.sqlite3")).expect("db")
    }

    fn sample_account(db: &Database) -> String {
        db.create_account(CreateAccountPayload {
            name: "Morning Lift".to_string(),
            niche: AccountNiche::Fitness,
            platforms: vec![Platform::ShortVideo],
            keywords: vec!["gym".to_string()],
            initial_metrics: None,
        })
        .expect("create account")
        .id
    }

    fn sample_video(db: &Database, account_id: &str, title: &str) -> String {
        db.create_video(CreateVideoPayload {
            account_id: account_id.to_string(),
            title: title.to_string(),
            script: None,
            caption: None,
            hook: None,
            hashtags: vec![],
            duration_seconds: 30,
            status: None,
            scheduled_at: None,
        })
        .expect("create video")
        .id
    }

    #[test]
    fn account_round_trip_with_seed_metrics() {
        let db = test_db();
        let account = db
            .create_account(CreateAccountPayload {
                name: "Plant Kitchen".to_string(),
                niche: AccountNiche::Food,
                platforms: vec![Platform::ShortVideo, Platform::PhotoReel],
                keywords: vec!["vegan".to_string(), "recipes".to_string()],
                initial_metrics: Some(vec![InitialPlatformMetric {
                    platform: Platform::ShortVideo,
                    followers: 1200,
                }]),
            })
            .expect("create account");

        let loaded = db
            .get_account(&account.id)
            .expect("get account")
            .expect("account exists");
        assert_eq!(loaded.name, "Plant Kitchen");
        assert_eq!(loaded.platforms.len(), 2);

        let seeded = db
            .list_account_metrics(&account.id, Some(Platform::ShortVideo))
            .expect("list metrics");
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].followers, 1200);
    }

    #[test]
    fn blank_account_name_is_rejected_before_persisting() {
        let db = test_db();
        let err = db
            .create_account(CreateAccountPayload {
                name: "   ".to_string(),
                niche: AccountNiche::Tech,
                platforms: vec![],
                keywords: vec![],
                initial_metrics: None,
            })
            .expect_err("blank name");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(db.list_accounts().expect("list").is_empty());
    }

    #[test]
    fn video_hashtags_are_normalized_and_deduplicated() {
        let db = test_db();
        let account_id = sample_account(&db);
        let video = db
            .create_video(CreateVideoPayload {
                account_id,
                title: "Leg day myths".to_string(),
                script: None,
                caption: None,
                hook: None,
                hashtags: vec![
                    "#GymTok".to_string(),
                    "gymtok".to_string(),
                    "  #Legday! ".to_string(),
                    "#".to_string(),
                ],
                duration_seconds: 45,
                status: None,
                scheduled_at: None,
            })
            .expect("create video");
        assert_eq!(video.hashtags, vec!["gymtok".to_string(), "legday".to_string()]);
    }

    #[test]
    fn marking_a_video_posted_fills_posted_at() {
        let db = test_db();
        let account_id = sample_account(&db);
        let video_id = sample_video(&db, &account_id, "Morning routine");

        let updated = db
            .update_video(
                &video_id,
                UpdateVideoPayload {
                    status: Some(VideoStatus::Posted),
                    ..UpdateVideoPayload::default()
                },
            )
            .expect("update video");
        assert_eq!(updated.status, VideoStatus::Posted);
        assert!(updated.posted_at.is_some());
        // Untouched fields survive the merge.
        assert_eq!(updated.title, "Morning routine");
        assert_eq!(updated.duration_seconds, 30);
    }

    #[test]
    fn deleting_a_video_cascades_to_metrics_and_note() {
        let db = test_db();
        let account_id = sample_account(&db);
        let video_id = sample_video(&db, &account_id, "Cascade target");

        db.record_video_metric(RecordVideoMetricPayload {
            video_id: video_id.clone(),
            platform: Platform::ShortVideo,
            views: 100,
            likes: 10,
            comments: 2,
            shares: 1,
        })
        .expect("record metric");
        db.save_video_note(
            &video_id,
            SaveVideoNotePayload {
                what_worked: Some("strong hook".to_string()),
                ..SaveVideoNotePayload::default()
            },
        )
        .expect("save note");
        let task = db
            .create_task(CreateTaskPayload {
                account_id: account_id.clone(),
                title: "Refresh metrics".to_string(),
                description: None,
                task_type: TaskType::MetricsUpdate,
                priority: None,
                due_at: None,
                video_id: Some(video_id.clone()),
            })
            .expect("create task");

        db.delete_video(&video_id).expect("delete video");

        assert!(db.get_video(&video_id).expect("get").is_none());
        assert!(db.list_video_metrics(&video_id).expect("metrics").is_empty());
        assert!(db.get_video_note(&video_id).expect("note").is_none());
        let orphaned = db.get_task(&task.id).expect("get task").expect("task kept");
        assert!(orphaned.video_id.is_none());
    }

    #[test]
    fn idea_priority_is_bounded() {
        let db = test_db();
        let account_id = sample_account(&db);
        let err = db
            .create_idea(CreateIdeaPayload {
                account_id: account_id.clone(),
                folder_id: None,
                title: "Over-prioritized".to_string(),
                description: None,
                priority: Some(9),
                status: None,
                tags: vec![],
            })
            .expect_err("priority out of range");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(db
            .list_ideas(&ListIdeasFilters {
                account_id: Some(account_id),
                ..ListIdeasFilters::default()
            })
            .expect("list")
            .is_empty());
    }

    #[test]
    fn ideas_list_orders_by_priority_then_recency() {
        let db = test_db();
        let account_id = sample_account(&db);
        for (title, priority) in [("low", 1), ("high", 5), ("mid", 3)] {
            db.create_idea(CreateIdeaPayload {
                account_id: account_id.clone(),
                folder_id: None,
                title: title.to_string(),
                description: None,
                priority: Some(priority),
                status: None,
                tags: vec![],
            })
            .expect("create idea");
        }
        let ideas = db
            .list_ideas(&ListIdeasFilters {
                account_id: Some(account_id),
                ..ListIdeasFilters::default()
            })
            .expect("list ideas");
        let titles: Vec<&str> = ideas.iter().map(|idea| idea.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "mid", "low"]);
    }

    #[test]
    fn deleting_a_folder_unfiles_its_ideas() {
        let db = test_db();
        let account_id = sample_account(&db);
        let folder = db.create_folder(&account_id, "Q3 hooks").expect("folder");
        let idea = db
            .create_idea(CreateIdeaPayload {
                account_id: account_id.clone(),
                folder_id: Some(folder.id.clone()),
                title: "Duet challenge".to_string(),
                description: None,
                priority: None,
                status: None,
                tags: vec![],
            })
            .expect("idea");

        db.delete_folder(&folder.id).expect("delete folder");

        let survivor = db.get_idea(&idea.id).expect("get idea").expect("idea kept");
        assert!(survivor.folder_id.is_none());
    }

    #[test]
    fn completing_and_snoozing_tasks() {
        let db = test_db();
        let account_id = sample_account(&db);
        let task = db
            .create_task(CreateTaskPayload {
                account_id,
                title: "Post teaser".to_string(),
                description: None,
                task_type: TaskType::Reminder,
                priority: Some(2),
                due_at: None,
                video_id: None,
            })
            .expect("create task");

        let snoozed_until = chrono::Utc::now() + chrono::Duration::days(2);
        let snoozed = db.snooze_task(&task.id, snoozed_until).expect("snooze");
        assert_eq!(
            snoozed.due_at.expect("due").timestamp(),
            snoozed_until.timestamp()
        );

        let done = db.complete_task(&task.id).expect("complete");
        assert!(done.completed_at.is_some());

        let open = db
            .list_tasks(&ListTasksFilters {
                status: Some(crate::models::TaskStatus::Pending),
                ..ListTasksFilters::default()
            })
            .expect("list pending");
        assert!(open.is_empty());
    }

    #[test]
    fn conversation_messages_are_sequenced_and_cascade_on_delete() {
        let db = test_db();
        let account_id = sample_account(&db);
        let conversation = db
            .create_conversation(&account_id, Some("Hook brainstorm"))
            .expect("create conversation");

        let first = db
            .append_message(&conversation.id, MessageRole::User, "Give me five hooks")
            .expect("first message");
        let second = db
            .append_message(&conversation.id, MessageRole::Assistant, "1. Stop scrolling...")
            .expect("second message");
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);

        let detail = db
            .get_conversation_detail(&conversation.id)
            .expect("detail")
            .expect("exists");
        assert_eq!(detail.messages.len(), 2);
        assert!(detail.conversation.updated_at >= detail.conversation.created_at);

        db.delete_conversation(&conversation.id).expect("delete");
        assert!(db
            .get_conversation_detail(&conversation.id)
            .expect("detail after delete")
            .is_none());
    }

    #[test]
    fn settings_merge_and_reset() {
        let db = test_db();
        assert_eq!(db.get_user_settings().expect("defaults"), UserSettings::default());

        let updated = db
            .update_user_settings(serde_json::json!({"chatModel": "openai/gpt-4o"}))
            .expect("update settings");
        assert_eq!(updated.chat_model, "openai/gpt-4o");
        assert_eq!(updated.creative_model, UserSettings::default().creative_model);

        let reset = db.reset_user_settings().expect("reset");
        assert_eq!(reset, UserSettings::default());
    }

    #[test]
    fn latest_video_metric_picks_newest_across_platforms() {
        let db = test_db();
        let account_id = sample_account(&db);
        let video_id = sample_video(&db, &account_id, "Cross-platform clip");

        for (platform, views) in [(Platform::ShortVideo, 50), (Platform::PhotoReel, 80)] {
            db.record_video_metric(RecordVideoMetricPayload {
                video_id: video_id.clone(),
                platform,
                views,
                likes: 0,
                comments: 0,
                shares: 0,
            })
            .expect("record metric");
        }

        let latest = db
            .latest_video_metric(&video_id)
            .expect("latest")
            .expect("exists");
        assert_eq!(latest.views, 80);
        let series = db.list_video_metrics(&video_id).expect("series");
        assert_eq!(series.len(), 2);
        assert!(series[0].recorded_at <= series[1].recorded_at);
    }

    #[test]
    fn filters_compose_as_logical_and() {
        let db = test_db();
        let account_a = sample_account(&db);
        let account_b = sample_account(&db);
        let posted = sample_video(&db, &account_a, "posted one");
        db.update_video(
            &posted,
            UpdateVideoPayload {
                status: Some(VideoStatus::Posted),
                ..UpdateVideoPayload::default()
            },
        )
        .expect("post");
        sample_video(&db, &account_a, "still planned");
        sample_video(&db, &account_b, "other account");

        let filtered = db
            .list_videos(&ListVideosFilters {
                account_id: Some(account_a),
                status: Some(VideoStatus::Posted),
                ..ListVideosFilters::default()
            })
            .expect("list");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "posted one");
    }

    #[test]
    fn hashtag_normalizer_strips_punctuation() {
        let raw = vec!["#Fit-Life".to_string(), "CARDIO".to_string()];
        assert_eq!(normalize_hashtags(&raw), vec!["fitlife", "cardio"]);
    }
}
