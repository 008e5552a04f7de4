use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{ActivityOutcome, Milestone, StreakRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const XP_CHECKIN: i64 = 5;
const XP_POST: i64 = 50;
const XP_METRICS: i64 = 20;
const XP_DEFAULT: i64 = 10;
const XP_STREAK_BONUS: i64 = 10;

/// Streak milestones surfaced to the user when the returned current streak
/// crosses a threshold. Read-only; the engine itself never stores these.
pub const MILESTONES: &[Milestone] = &[
    Milestone { days: 7, bonus_xp: 50, label: "One week strong" },
    Milestone { days: 14, bonus_xp: 100, label: "Two week creator" },
    Milestone { days: 30, bonus_xp: 250, label: "Monthly machine" },
    Milestone { days: 60, bonus_xp: 500, label: "Consistency pro" },
    Milestone { days: 100, bonus_xp: 1000, label: "Century club" },
    Milestone { days: 365, bonus_xp: 5000, label: "A full year" },
];

pub fn milestone_for(current_streak: i64) -> Option<Milestone> {
    MILESTONES
        .iter()
        .find(|milestone| milestone.days == current_streak)
        .copied()
}

/// Drives the per-account daily streak and XP totals.
///
/// The load-compute-store sequence is a check-then-act race under concurrent
/// callers, so every account gets its own lock and `record_activity` holds it
/// across the whole sequence. Two concurrent calls for the same account are
/// therefore serialized; calls for different accounts proceed in parallel.
pub struct StreakEngine {
    db: Arc<Database>,
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StreakEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Records one activity for the account and returns the updated streak
    /// together with the XP awarded by this call.
    ///
    /// Streaks are keyed by account id without a foreign-key check, so this
    /// succeeds even for an account id with no account row.
    pub fn record_activity(&self, account_id: &str, action: &str) -> AppResult<ActivityOutcome> {
        let lock = self.lock_for(account_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AppError::Internal("streak account lock poisoned".to_string()))?;

        let before = self.db.get_or_create_streak(account_id)?;
        let outcome = advance(before, action, Utc::now());
        self.db.save_streak(&outcome.streak)?;

        tracing::debug!(
            account_id = %account_id,
            action = %action,
            xp_gained = outcome.xp_gained,
            current_streak = outcome.streak.current_streak,
            "activity recorded"
        );
        Ok(outcome)
    }

    pub fn get_streak(&self, account_id: &str) -> AppResult<StreakRecord> {
        self.db.get_or_create_streak(account_id)
    }

    fn lock_for(&self, account_id: &str) -> AppResult<Arc<Mutex<()>>> {
        let mut locks = self
            .account_locks
            .lock()
            .map_err(|_| AppError::Internal("streak lock registry poisoned".to_string()))?;
        Ok(locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

fn base_xp(action: &str) -> i64 {
    match action {
        "checkin" => XP_CHECKIN,
        "post" => XP_POST,
        "metrics" => XP_METRICS,
        _ => XP_DEFAULT,
    }
}

/// Pure streak step function, separated from storage so the calendar math can
/// be exercised at arbitrary instants.
///
/// Day difference is whole elapsed 24h periods (floored), while "new day" is
/// a calendar-date comparison. The two disagree for an activity that crosses
/// midnight in under 24 hours: that counts as a new day with a day difference
/// of zero, and leaves the streak length untouched.
pub fn advance(mut streak: StreakRecord, action: &str, now: DateTime<Utc>) -> ActivityOutcome {
    let mut xp_gained = base_xp(action);
    let is_new_day = match streak.last_activity_at {
        None => true,
        Some(prev) => prev.date_naive() != now.date_naive(),
    };

    if is_new_day {
        match streak.last_activity_at {
            None => {
                streak.current_streak = 1;
            }
            Some(prev) => {
                let day_diff = (now - prev).num_days();
                if day_diff == 1 {
                    streak.current_streak += 1;
                    xp_gained += XP_STREAK_BONUS;
                } else if day_diff > 1 {
                    streak.current_streak = 1;
                }
            }
        }
    }

    streak.longest_streak = streak.longest_streak.max(streak.current_streak);
    streak.last_activity_at = Some(now);
    streak.xp_total += xp_gained;

    ActivityOutcome {
        streak,
        xp_gained,
        is_new_day,
    }
}

#[cfg(test)]
mod tests {
    use super::{advance, milestone_for, StreakEngine};
    use crate::db::Database;
    use crate::models::StreakRecord;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("valid time")
    }

    #[test]
    fn first_activity_starts_the_streak() {
        let outcome = advance(StreakRecord::empty("acct"), "checkin", at(2025, 3, 1, 9, 0));
        assert_eq!(outcome.streak.current_streak, 1);
        assert_eq!(outcome.streak.longest_streak, 1);
        assert_eq!(outcome.xp_gained, 5);
        assert_eq!(outcome.streak.xp_total, 5);
        assert!(outcome.is_new_day);
    }

    #[test]
    fn same_day_repeat_keeps_streak_and_awards_base_only() {
        let first = advance(StreakRecord::empty("acct"), "checkin", at(2025, 3, 1, 9, 0));
        let second = advance(first.streak, "checkin", at(2025, 3, 1, 17, 30));
        assert!(!second.is_new_day);
        assert_eq!(second.streak.current_streak, 1);
        assert_eq!(second.xp_gained, 5);
        assert_eq!(second.streak.xp_total, 10);
    }

    #[test]
    fn next_day_increments_and_pays_the_bonus() {
        let first = advance(StreakRecord::empty("acct"), "post", at(2025, 3, 1, 9, 0));
        let second = advance(first.streak, "checkin", at(2025, 3, 2, 9, 30));
        assert!(second.is_new_day);
        assert_eq!(second.streak.current_streak, 2);
        assert_eq!(second.xp_gained, 5 + 10);
        assert_eq!(second.streak.longest_streak, 2);
    }

    #[test]
    fn a_gap_resets_but_longest_survives() {
        let mut streak = StreakRecord::empty("acct");
        for day in 1..=4 {
            streak = advance(streak, "checkin", at(2025, 3, day, 8, 0)).streak;
        }
        assert_eq!(streak.current_streak, 4);

        let after_gap = advance(streak, "checkin", at(2025, 3, 9, 8, 0));
        assert_eq!(after_gap.streak.current_streak, 1);
        assert_eq!(after_gap.streak.longest_streak, 4);
        assert_eq!(after_gap.xp_gained, 5);
    }

    #[test]
    fn midnight_crossing_under_24h_is_a_new_day_without_movement() {
        let first = advance(StreakRecord::empty("acct"), "checkin", at(2025, 3, 1, 23, 50));
        let second = advance(first.streak, "checkin", at(2025, 3, 2, 0, 10));
        assert!(second.is_new_day);
        // Dates differ but less than one whole day elapsed: no increment,
        // no reset, no bonus.
        assert_eq!(second.streak.current_streak, 1);
        assert_eq!(second.xp_gained, 5);
    }

    #[test]
    fn action_xp_table() {
        let base = at(2025, 3, 1, 12, 0);
        for (action, xp) in [("checkin", 5), ("post", 50), ("metrics", 20), ("mystery", 10)] {
            let outcome = advance(StreakRecord::empty("acct"), action, base);
            assert_eq!(outcome.xp_gained, xp, "action {action}");
        }
    }

    #[test]
    fn unknown_account_still_accrues() {
        let db = Arc::new(Database::in_memory().expect("db"));
        let engine = StreakEngine::new(db);
        let outcome = engine
            .record_activity("ghost-account", "post")
            .expect("record");
        assert_eq!(outcome.streak.current_streak, 1);
        assert_eq!(outcome.streak.xp_total, 50);
    }

    #[test]
    fn concurrent_same_day_checkins_never_lose_xp() {
        let db = Arc::new(Database::in_memory().expect("db"));
        let engine = Arc::new(StreakEngine::new(db));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(std::thread::spawn(move || {
                engine.record_activity("acct-1", "checkin").expect("record")
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }

        let streak = engine.get_streak("acct-1").expect("streak");
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.xp_total, 8 * 5);
    }

    #[test]
    fn milestones_hit_exact_thresholds_only() {
        assert!(milestone_for(6).is_none());
        let week = milestone_for(7).expect("week milestone");
        assert_eq!(week.bonus_xp, 50);
        assert!(milestone_for(8).is_none());
        assert_eq!(milestone_for(365).expect("year").label, "A full year");
    }

    #[test]
    fn day_diff_uses_whole_elapsed_days() {
        // 47 hours later lands two calendar days ahead but only one whole
        // elapsed day: still a continuation.
        let first = advance(StreakRecord::empty("acct"), "checkin", at(2025, 3, 1, 23, 0));
        let later = first.streak.last_activity_at.expect("last") + Duration::hours(47);
        let second = advance(first.streak, "checkin", later);
        assert!(second.is_new_day);
        assert_eq!(second.streak.current_streak, 2);
    }
}
