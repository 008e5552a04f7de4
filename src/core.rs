use crate::db::Database;
use crate::errors::AppResult;
use crate::export::ExportService;
use crate::models::{AccountExport, ActivityOutcome, StreakRecord};
use crate::streak::StreakEngine;
use crate::taskgen::TaskGenerator;
use std::path::Path;
use std::sync::Arc;

const DB_FILE_NAME: &str = "planner.sqlite3";

/// Entry point wiring the store to the engines that run on top of it. Opened
/// once per process; UI-level callers hold a clone and go through it for
/// anything beyond plain entity CRUD.
#[derive(Clone)]
pub struct PlannerCore {
    db: Arc<Database>,
    streaks: Arc<StreakEngine>,
    tasks: Arc<TaskGenerator>,
    exports: Arc<ExportService>,
}

impl PlannerCore {
    pub fn new(data_dir: &Path) -> AppResult<Self> {
        let db = Arc::new(Database::new(&data_dir.join(DB_FILE_NAME))?);
        Ok(Self::with_database(db))
    }

    /// In-memory store, for tests and throwaway sessions.
    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::with_database(Arc::new(Database::in_memory()?)))
    }

    fn with_database(db: Arc<Database>) -> Self {
        let streaks = Arc::new(StreakEngine::new(db.clone()));
        let tasks = Arc::new(TaskGenerator::new(db.clone()));
        let exports = Arc::new(ExportService::new(db.clone()));
        Self {
            db,
            streaks,
            tasks,
            exports,
        }
    }

    /// Direct access to the entity services.
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn record_activity(&self, account_id: &str, action: &str) -> AppResult<ActivityOutcome> {
        self.streaks.record_activity(account_id, action)
    }

    pub fn get_streak(&self, account_id: &str) -> AppResult<StreakRecord> {
        self.streaks.get_streak(account_id)
    }

    pub fn generate_metrics_update_tasks(&self, account_id: &str) -> AppResult<usize> {
        self.tasks.generate_metrics_update_tasks(account_id)
    }

    pub fn export_account(&self, account_id: &str) -> AppResult<AccountExport> {
        self.exports.export_account(account_id)
    }
}
