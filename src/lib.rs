pub mod core;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod export;
pub mod ids;
pub mod metrics;
pub mod models;
pub mod streak;
pub mod taskgen;

pub use crate::core::PlannerCore;
pub use crate::crypto::FieldCipher;
pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Routes JSON-formatted logs to a daily-rolling file under the data
/// directory. Call once at startup; subsequent calls fail with the
/// subscriber error.
pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "planner.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
