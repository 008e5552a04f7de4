use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountNiche {
    Fitness,
    Beauty,
    Finance,
    Food,
    Travel,
    Tech,
    Education,
    Entertainment,
}

impl AccountNiche {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fitness => "fitness",
            Self::Beauty => "beauty",
            Self::Finance => "finance",
            Self::Food => "food",
            Self::Travel => "travel",
            Self::Tech => "tech",
            Self::Education => "education",
            Self::Entertainment => "entertainment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    ShortVideo,
    PhotoReel,
    Story,
    Live,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortVideo => "short-video",
            Self::PhotoReel => "photo-reel",
            Self::Story => "story",
            Self::Live => "live",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoStatus {
    Planned,
    Filmed,
    Edited,
    Posted,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Filmed => "filmed",
            Self::Edited => "edited",
            Self::Posted => "posted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    New,
    InProgress,
    Used,
    Archived,
}

impl IdeaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Used => "used",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    MetricsUpdate,
    Reminder,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MetricsUpdate => "metrics_update",
            Self::Reminder => "reminder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

// ─── Accounts ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub niche: AccountNiche,
    pub platforms: Vec<Platform>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Seed metric captured at onboarding, recorded as the platform's first
/// snapshot in the same transaction as the account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPlatformMetric {
    pub platform: Platform,
    pub followers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountPayload {
    pub name: String,
    pub niche: AccountNiche,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub initial_metrics: Option<Vec<InitialPlatformMetric>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountPayload {
    pub name: Option<String>,
    pub platforms: Option<Vec<Platform>>,
    pub keywords: Option<Vec<String>>,
}

// ─── Videos ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub script: Option<String>,
    pub caption: Option<String>,
    pub hook: Option<String>,
    pub hashtags: Vec<String>,
    pub duration_seconds: i64,
    pub status: VideoStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoPayload {
    pub account_id: String,
    pub title: String,
    pub script: Option<String>,
    pub caption: Option<String>,
    pub hook: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub duration_seconds: i64,
    pub status: Option<VideoStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoPayload {
    pub title: Option<String>,
    pub script: Option<String>,
    pub caption: Option<String>,
    pub hook: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub duration_seconds: Option<i64>,
    pub status: Option<VideoStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosFilters {
    pub account_id: Option<String>,
    pub status: Option<VideoStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ─── Metric snapshots ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetricRecord {
    pub id: String,
    pub video_id: String,
    pub platform: Platform,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVideoMetricPayload {
    pub video_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub shares: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetricRecord {
    pub id: String,
    pub account_id: String,
    pub platform: Platform,
    pub followers: i64,
    pub reach: Option<i64>,
    pub impressions: Option<i64>,
    pub profile_views: Option<i64>,
    pub engagement_rate: Option<f64>,
    pub total_views: Option<i64>,
    pub total_likes: Option<i64>,
    pub total_comments: Option<i64>,
    pub total_shares: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAccountMetricPayload {
    pub account_id: String,
    pub platform: Platform,
    pub followers: i64,
    pub reach: Option<i64>,
    pub impressions: Option<i64>,
    pub profile_views: Option<i64>,
    pub engagement_rate: Option<f64>,
    pub total_views: Option<i64>,
    pub total_likes: Option<i64>,
    pub total_comments: Option<i64>,
    pub total_shares: Option<i64>,
}

// ─── Ideas & folders ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaRecord {
    pub id: String,
    pub account_id: String,
    pub folder_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub status: IdeaStatus,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdeaPayload {
    pub account_id: String,
    pub folder_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub status: Option<IdeaStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIdeaPayload {
    pub folder_id: Option<Option<String>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub status: Option<IdeaStatus>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListIdeasFilters {
    pub account_id: Option<String>,
    pub folder_id: Option<String>,
    pub status: Option<IdeaStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ─── Tasks ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: i64,
    pub status: TaskStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub video_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub account_id: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: Option<i64>,
    pub due_at: Option<DateTime<Utc>>,
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub status: Option<TaskStatus>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksFilters {
    pub account_id: Option<String>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub video_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ─── Streak & XP ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub account_id: String,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub xp_total: i64,
}

impl StreakRecord {
    pub fn empty(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_at: None,
            xp_total: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub streak: StreakRecord,
    pub xp_gained: i64,
    pub is_new_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub days: i64,
    pub bonus_xp: i64,
    pub label: &'static str,
}

// ─── Video notes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoNoteRecord {
    pub video_id: String,
    pub what_worked: Option<String>,
    pub what_to_improve: Option<String>,
    pub next_experiment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveVideoNotePayload {
    pub what_worked: Option<String>,
    pub what_to_improve: Option<String>,
    pub next_experiment: Option<String>,
}

// ─── Trend reports ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReportRecord {
    pub id: String,
    pub account_id: String,
    pub provider: String,
    pub content: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

// ─── Conversations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub seq: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub conversation: ConversationRecord,
    pub messages: Vec<MessageRecord>,
}

// ─── Settings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub chat_model: String,
    pub creative_model: String,
    pub analysis_model: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            chat_model: "openai/gpt-4o-mini".to_string(),
            creative_model: "anthropic/claude-3.5-sonnet".to_string(),
            analysis_model: "openai/gpt-4o".to_string(),
        }
    }
}

// ─── Export document ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExportEntry {
    pub video: VideoRecord,
    pub metrics: Vec<VideoMetricRecord>,
    pub note: Option<VideoNoteRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub average_views: f64,
    pub engagement_rate: f64,
    pub videos_with_metrics: i64,
}

/// Downloadable artifact. Top-level key names are user-facing and must stay
/// stable across releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountExport {
    pub exported_at: DateTime<Utc>,
    pub account_name: String,
    pub account_type: AccountNiche,
    pub videos: Vec<VideoExportEntry>,
    pub metrics_summary: MetricsSummary,
    pub ideas: Vec<IdeaRecord>,
    pub streak: StreakRecord,
}
