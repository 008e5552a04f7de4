use chrono::{Duration, Utc};
use creator_planner::models::{
    AccountNiche, CreateAccountPayload, CreateIdeaPayload, CreateVideoPayload,
    InitialPlatformMetric, ListTasksFilters, Platform, RecordAccountMetricPayload,
    RecordVideoMetricPayload, SaveVideoNotePayload, StreakRecord, TaskType, UpdateVideoPayload,
    VideoStatus,
};
use creator_planner::streak::milestone_for;
use creator_planner::PlannerCore;

fn planner() -> PlannerCore {
    PlannerCore::in_memory().expect("planner core")
}

fn onboard_account(core: &PlannerCore, name: &str) -> String {
    core.db()
        .create_account(CreateAccountPayload {
            name: name.to_string(),
            niche: AccountNiche::Fitness,
            platforms: vec![Platform::ShortVideo, Platform::PhotoReel],
            keywords: vec!["mobility".to_string()],
            initial_metrics: Some(vec![InitialPlatformMetric {
                platform: Platform::ShortVideo,
                followers: 500,
            }]),
        })
        .expect("create account")
        .id
}

#[test]
fn checkin_then_post_on_the_same_day_shares_one_streak_day() {
    let core = planner();
    let account_id = onboard_account(&core, "Daily Mobility");

    let checkin = core.record_activity(&account_id, "checkin").expect("checkin");
    assert_eq!(checkin.streak.current_streak, 1);
    assert_eq!(checkin.xp_gained, 5);
    assert!(checkin.is_new_day);

    let post = core.record_activity(&account_id, "post").expect("post");
    assert!(!post.is_new_day);
    assert_eq!(post.streak.current_streak, 1);
    assert_eq!(post.xp_gained, 50);
    assert_eq!(post.streak.xp_total, 55);
}

#[test]
fn a_seeded_yesterday_streak_continues_with_bonus() {
    let core = planner();
    let account_id = onboard_account(&core, "Continuity");

    core.db()
        .save_streak(&StreakRecord {
            account_id: account_id.clone(),
            current_streak: 6,
            longest_streak: 6,
            last_activity_at: Some(Utc::now() - Duration::days(1)),
            xp_total: 400,
        })
        .expect("seed streak");

    let outcome = core.record_activity(&account_id, "checkin").expect("checkin");
    assert!(outcome.is_new_day);
    assert_eq!(outcome.streak.current_streak, 7);
    assert_eq!(outcome.xp_gained, 5 + 10);
    assert_eq!(outcome.streak.longest_streak, 7);

    // Crossing 7 days surfaces the weekly milestone to the caller.
    let milestone = milestone_for(outcome.streak.current_streak).expect("milestone");
    assert_eq!(milestone.days, 7);
    assert!(milestone.bonus_xp > 0);
}

#[test]
fn a_long_gap_resets_the_streak_but_not_the_record() {
    let core = planner();
    let account_id = onboard_account(&core, "Lapsed");

    core.db()
        .save_streak(&StreakRecord {
            account_id: account_id.clone(),
            current_streak: 12,
            longest_streak: 20,
            last_activity_at: Some(Utc::now() - Duration::days(5)),
            xp_total: 900,
        })
        .expect("seed streak");

    let outcome = core.record_activity(&account_id, "metrics").expect("metrics");
    assert_eq!(outcome.streak.current_streak, 1);
    assert_eq!(outcome.streak.longest_streak, 20);
    assert_eq!(outcome.xp_gained, 20);
}

#[test]
fn metrics_reminders_only_target_stale_posted_videos() {
    let core = planner();
    let account_id = onboard_account(&core, "Reminder Flow");

    // Posted well outside the window, never measured.
    let stale = core
        .db()
        .create_video(CreateVideoPayload {
            account_id: account_id.clone(),
            title: "Hip opener routine".to_string(),
            script: None,
            caption: None,
            hook: None,
            hashtags: vec![],
            duration_seconds: 40,
            status: None,
            scheduled_at: None,
        })
        .expect("video");
    core.db()
        .update_video(
            &stale.id,
            UpdateVideoPayload {
                status: Some(VideoStatus::Posted),
                posted_at: Some(Utc::now() - Duration::days(10)),
                ..UpdateVideoPayload::default()
            },
        )
        .expect("post stale");

    // Posted recently: inside the 7-day grace window.
    let fresh = core
        .db()
        .create_video(CreateVideoPayload {
            account_id: account_id.clone(),
            title: "New warmup".to_string(),
            script: None,
            caption: None,
            hook: None,
            hashtags: vec![],
            duration_seconds: 25,
            status: None,
            scheduled_at: None,
        })
        .expect("video");
    core.db()
        .update_video(
            &fresh.id,
            UpdateVideoPayload {
                status: Some(VideoStatus::Posted),
                posted_at: Some(Utc::now() - Duration::days(3)),
                ..UpdateVideoPayload::default()
            },
        )
        .expect("post fresh");

    assert_eq!(
        core.generate_metrics_update_tasks(&account_id).expect("run"),
        1
    );
    // Idempotent: nothing new without intervening changes.
    assert_eq!(
        core.generate_metrics_update_tasks(&account_id).expect("rerun"),
        0
    );

    let tasks = core
        .db()
        .list_tasks(&ListTasksFilters {
            account_id: Some(account_id),
            task_type: Some(TaskType::MetricsUpdate),
            ..ListTasksFilters::default()
        })
        .expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].video_id.as_deref(), Some(stale.id.as_str()));
}

#[test]
fn export_composes_catalog_metrics_ideas_and_streak() {
    let core = planner();
    let account_id = onboard_account(&core, "Exporter");

    let video = core
        .db()
        .create_video(CreateVideoPayload {
            account_id: account_id.clone(),
            title: "Stretch challenge day 1".to_string(),
            script: Some("Open on the mat".to_string()),
            caption: None,
            hook: Some("30 days, 30 stretches".to_string()),
            hashtags: vec!["#stretch".to_string()],
            duration_seconds: 35,
            status: Some(VideoStatus::Posted),
            scheduled_at: None,
        })
        .expect("video");
    core.db()
        .record_video_metric(RecordVideoMetricPayload {
            video_id: video.id.clone(),
            platform: Platform::ShortVideo,
            views: 2400,
            likes: 200,
            comments: 30,
            shares: 10,
        })
        .expect("metric");
    core.db()
        .save_video_note(
            &video.id,
            SaveVideoNotePayload {
                what_worked: Some("day-count format".to_string()),
                ..SaveVideoNotePayload::default()
            },
        )
        .expect("note");
    core.db()
        .create_idea(CreateIdeaPayload {
            account_id: account_id.clone(),
            folder_id: None,
            title: "Partner stretching episode".to_string(),
            description: None,
            priority: Some(5),
            status: None,
            tags: vec!["series".to_string()],
        })
        .expect("idea");
    core.record_activity(&account_id, "post").expect("activity");

    let export = core.export_account(&account_id).expect("export");
    assert_eq!(export.account_name, "Exporter");
    assert_eq!(export.videos.len(), 1);
    assert_eq!(export.videos[0].metrics.len(), 1);
    assert!(export.videos[0].note.is_some());
    assert_eq!(export.ideas.len(), 1);
    assert_eq!(export.metrics_summary.total_views, 2400);
    assert_eq!(export.streak.current_streak, 1);
    assert_eq!(export.streak.xp_total, 50);
}

#[test]
fn follower_growth_reads_off_the_snapshot_series() {
    let core = planner();
    let account_id = onboard_account(&core, "Growth");

    // Onboarding seeded 500 followers; record a later snapshot.
    core.db()
        .record_account_metric(RecordAccountMetricPayload {
            account_id: account_id.clone(),
            platform: Platform::ShortVideo,
            followers: 530,
            reach: Some(12_000),
            impressions: None,
            profile_views: None,
            engagement_rate: None,
            total_views: None,
            total_likes: None,
            total_comments: None,
            total_shares: None,
        })
        .expect("snapshot");

    let series = core
        .db()
        .list_account_metrics(&account_id, Some(Platform::ShortVideo))
        .expect("series");
    assert_eq!(series.len(), 2);
    let growth = series[series.len() - 1].followers - series[series.len() - 2].followers;
    assert_eq!(growth, 30);
}

#[test]
fn concurrent_checkins_through_the_core_stay_consistent() {
    let core = planner();
    let account_id = onboard_account(&core, "Busy Fingers");

    let mut handles = Vec::new();
    for _ in 0..6 {
        let core = core.clone();
        let account_id = account_id.clone();
        handles.push(std::thread::spawn(move || {
            core.record_activity(&account_id, "checkin").expect("checkin")
        }));
    }
    for handle in handles {
        handle.join().expect("thread");
    }

    let streak = core.get_streak(&account_id).expect("streak");
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.xp_total, 6 * 5);
}
