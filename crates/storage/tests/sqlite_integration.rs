use drill_core::model::{ModuleEntry, ModuleNumber, UserStats};
use drill_core::time::fixed_now;
use storage::repository::{
    AttemptWrite, ModuleRepository, NewUser, ProgressEffects, ProgressRepository, StorageError,
    UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        password_hash: "$2b$04$test-hash".to_string(),
        email: Some(format!("{name}@example.com")),
        created_at: fixed_now(),
    }
}

fn attempt(user: drill_core::model::UserId, module: u32, score: u32) -> AttemptWrite {
    AttemptWrite {
        user_id: user,
        module_number: ModuleNumber::new(module),
        score,
        total_questions: 10,
        time_taken_secs: 145,
        recorded_at: fixed_now(),
    }
}

#[tokio::test]
async fn registration_creates_user_and_gated_progress() {
    let repo = connect("memdb_register").await;

    let user = repo.register_user(&new_user("recruit"), 4).await.unwrap();
    assert_eq!(user.username, "recruit");
    assert!(user.last_login.is_none());

    let unlocked = repo.unlocked_modules(user.id).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].module_number, ModuleNumber::new(1));
    assert!(!unlocked[0].completed);

    for number in 2..=4 {
        let progress = repo
            .progress_for(user.id, ModuleNumber::new(number))
            .await
            .unwrap()
            .expect("row must exist");
        assert!(!progress.is_unlocked());
        assert!(!progress.is_completed());
        assert_eq!(progress.attempts(), 0);
    }
}

#[tokio::test]
async fn duplicate_username_rolls_back_cleanly() {
    let repo = connect("memdb_duplicate").await;

    let first = repo.register_user(&new_user("recruit"), 3).await.unwrap();
    let err = repo.register_user(&new_user("recruit"), 3).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // The failed registration must leave no orphaned progress rows: the only
    // rows present belong to the first user.
    let unlocked = repo.unlocked_modules(first.id).await.unwrap();
    assert_eq!(unlocked.len(), 1);
}

#[tokio::test]
async fn login_roundtrip_finds_user_and_stamps_login() {
    let repo = connect("memdb_login").await;

    let registered = repo.register_user(&new_user("recruit"), 2).await.unwrap();

    let found = repo
        .find_by_username("recruit")
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(found.id, registered.id);
    assert_eq!(found.password_hash, "$2b$04$test-hash");

    assert!(repo.find_by_username("nobody").await.unwrap().is_none());

    repo.touch_last_login(registered.id, fixed_now()).await.unwrap();
    let found = repo.find_by_id(registered.id).await.unwrap().unwrap();
    assert_eq!(found.last_login, Some(fixed_now()));
}

#[tokio::test]
async fn passing_attempt_completes_module_and_unlocks_successor() {
    let repo = connect("memdb_pass").await;
    let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();

    let n = repo
        .record_attempt(
            &attempt(user.id, 1, 8),
            &ProgressEffects {
                complete: true,
                unlock_next: Some(ModuleNumber::new(2)),
            },
        )
        .await
        .unwrap();
    assert_eq!(n, 1);

    let first = repo
        .progress_for(user.id, ModuleNumber::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(first.is_completed());
    assert!(first.is_unlocked());
    assert_eq!(first.attempts(), 1);
    assert_eq!(first.completion_date(), Some(fixed_now()));

    let second = repo
        .progress_for(user.id, ModuleNumber::new(2))
        .await
        .unwrap()
        .unwrap();
    assert!(second.is_unlocked());
    assert!(!second.is_completed());

    let unlocked = repo.unlocked_modules(user.id).await.unwrap();
    let numbers: Vec<u32> = unlocked.iter().map(|m| m.module_number.value()).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn failed_retry_keeps_completion_and_unlock() {
    let repo = connect("memdb_retry").await;
    let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();

    repo.record_attempt(
        &attempt(user.id, 1, 8),
        &ProgressEffects {
            complete: true,
            unlock_next: Some(ModuleNumber::new(2)),
        },
    )
    .await
    .unwrap();

    let n = repo
        .record_attempt(
            &attempt(user.id, 1, 6),
            &ProgressEffects {
                complete: false,
                unlock_next: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(n, 2);

    let first = repo
        .progress_for(user.id, ModuleNumber::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(first.is_completed(), "failing retry must not un-complete");
    assert_eq!(first.attempts(), 2);

    let second = repo
        .progress_for(user.id, ModuleNumber::new(2))
        .await
        .unwrap()
        .unwrap();
    assert!(second.is_unlocked(), "failing retry must not revoke unlock");
}

#[tokio::test]
async fn attempt_history_is_ordered_and_numbered() {
    let repo = connect("memdb_history").await;
    let user = repo.register_user(&new_user("recruit"), 2).await.unwrap();
    let effects = ProgressEffects {
        complete: false,
        unlock_next: None,
    };

    for score in [3, 5, 7] {
        repo.record_attempt(&attempt(user.id, 1, score), &effects)
            .await
            .unwrap();
    }

    let history = repo
        .attempts_for(user.id, ModuleNumber::new(1))
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.attempt_number(), i as u32 + 1);
        assert_eq!(record.total_questions(), 10);
        assert_eq!(record.time_taken_secs(), 145);
    }
    assert_eq!(history[2].score(), 7);

    // Attempts against another module have their own numbering.
    let other = repo
        .attempts_for(user.id, ModuleNumber::new(2))
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn stats_default_to_zero_and_aggregate_history() {
    let repo = connect("memdb_stats").await;
    let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();

    let empty = repo.user_stats(user.id).await.unwrap();
    assert_eq!(empty, UserStats::default());

    repo.add_study_time(user.id, ModuleNumber::new(1), 90)
        .await
        .unwrap();
    repo.record_attempt(
        &attempt(user.id, 1, 8),
        &ProgressEffects {
            complete: true,
            unlock_next: Some(ModuleNumber::new(2)),
        },
    )
    .await
    .unwrap();
    repo.record_attempt(
        &attempt(user.id, 2, 4),
        &ProgressEffects {
            complete: false,
            unlock_next: None,
        },
    )
    .await
    .unwrap();

    let stats = repo.user_stats(user.id).await.unwrap();
    assert_eq!(stats.completed_modules, 1);
    assert!((stats.average_score - 6.0).abs() < f64::EPSILON);
    assert_eq!(stats.total_study_time_secs, 90);
}

#[tokio::test]
async fn study_time_update_on_missing_row_is_a_noop() {
    let repo = connect("memdb_study_noop").await;
    let user = repo.register_user(&new_user("recruit"), 2).await.unwrap();

    repo.add_study_time(user.id, ModuleNumber::new(7), 60)
        .await
        .unwrap();

    let stats = repo.user_stats(user.id).await.unwrap();
    assert_eq!(stats.total_study_time_secs, 0);
}

#[tokio::test]
async fn module_catalog_seeding_is_idempotent() {
    let repo = connect("memdb_catalog").await;

    let entries = vec![
        ModuleEntry::new(ModuleNumber::new(1), "Marksmanship Basics", "module_1.pdf").unwrap(),
        ModuleEntry::new(ModuleNumber::new(2), "Wind and Distance", "module_2.pdf").unwrap(),
    ];
    repo.seed_modules(&entries).await.unwrap();
    repo.seed_modules(&entries).await.unwrap();

    let listed = repo.list_modules().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title(), "Marksmanship Basics");
    assert_eq!(listed[1].number(), ModuleNumber::new(2));
}
