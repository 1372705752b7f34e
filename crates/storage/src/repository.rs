use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drill_core::model::{
    ModuleEntry, ModuleNumber, ModuleProgress, ProgressError, QuizAttempt, UserId, UserStats,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated; registration maps this to a
    /// duplicate-username outcome.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Input for creating a user row. The hash is produced by the services
/// layer; storage never sees a plaintext password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted shape of a user, including the credential hash.
///
/// This stays inside the storage/services boundary; the domain `User` type
/// carries no hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Convert the record into the domain `User`, dropping the hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored row fails domain
    /// validation.
    pub fn into_user(self) -> Result<drill_core::model::User, StorageError> {
        drill_core::model::User::from_persisted(
            self.id,
            self.username,
            self.email,
            self.created_at,
            self.last_login,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// One row of the unlocked-modules listing, ascending by module number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockedModule {
    pub module_number: ModuleNumber,
    pub completed: bool,
}

/// The attempt row to append, exactly as it will be persisted (minus the
/// attempt number, which the store assigns inside the transaction).
#[derive(Debug, Clone)]
pub struct AttemptWrite {
    pub user_id: UserId,
    pub module_number: ModuleNumber,
    pub score: u32,
    pub total_questions: u32,
    pub time_taken_secs: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Progress side effects of an attempt, decided by quiz policy upstream.
///
/// `unlock_next` names the successor module to unlock; `None` either means
/// the attempt failed or the passed module was the last one.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEffects {
    pub complete: bool,
    pub unlock_next: Option<ModuleNumber>,
}

/// Repository contract for user identities.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create the user row plus one progress row per module (module 1
    /// unlocked, the rest locked) as a single atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the username is taken; no
    /// partial writes remain in that case.
    async fn register_user(
        &self,
        user: &NewUser,
        total_modules: u32,
    ) -> Result<UserRecord, StorageError>;

    /// Look up a user by exact username.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StorageError>;

    /// Stamp the last successful login.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user row is missing.
    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Repository contract for the static module catalog.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Insert catalog rows, ignoring entries that already exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn seed_modules(&self, entries: &[ModuleEntry]) -> Result<(), StorageError>;

    /// All catalog rows ascending by module number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn list_modules(&self) -> Result<Vec<ModuleEntry>, StorageError>;
}

/// Repository contract for unlock/completion state and quiz history.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Modules the user may enter, ascending, with completion flags.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn unlocked_modules(&self, user: UserId) -> Result<Vec<UnlockedModule>, StorageError>;

    /// Full progress row for one (user, module) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn progress_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Option<ModuleProgress>, StorageError>;

    /// Add study seconds to a module. A missing progress row is a silent
    /// no-op; the row always exists when the registration invariant holds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn add_study_time(
        &self,
        user: UserId,
        module: ModuleNumber,
        delta_secs: u64,
    ) -> Result<(), StorageError>;

    /// Append the attempt and apply its progress effects as one atomic unit:
    /// assign the 1-based attempt number, insert the attempt row, bump the
    /// progress attempt counter, then mark completion and unlock the
    /// successor when the effects say so (creating the successor row if it
    /// is absent). Returns the assigned attempt number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on failure; no partial writes remain.
    async fn record_attempt(
        &self,
        write: &AttemptWrite,
        effects: &ProgressEffects,
    ) -> Result<u32, StorageError>;

    /// Attempt history for one (user, module) pair, ascending by attempt
    /// number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn attempts_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Vec<QuizAttempt>, StorageError>;

    /// Aggregates for the dashboard; every field is zero when the user has
    /// no history yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backing-store failure.
    async fn user_stats(&self, user: UserId) -> Result<UserStats, StorageError>;
}

// ─── In-memory implementation ──────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ProgressRow {
    unlocked: bool,
    completed: bool,
    completion_date: Option<DateTime<Utc>>,
    study_time_secs: u64,
    attempts: u32,
}

impl ProgressRow {
    fn initial(module: ModuleNumber) -> Self {
        Self {
            unlocked: module.is_first(),
            completed: false,
            completion_date: None,
            study_time_secs: 0,
            attempts: 0,
        }
    }

    fn unlocked_row() -> Self {
        Self {
            unlocked: true,
            completed: false,
            completion_date: None,
            study_time_secs: 0,
            attempts: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct AttemptRow {
    write: AttemptWrite,
    attempt_number: u32,
}

#[derive(Default)]
struct InMemoryState {
    next_user_id: u64,
    users: Vec<UserRecord>,
    modules: Vec<ModuleEntry>,
    // Keyed by (user, module); BTreeMap keeps listings in ascending order.
    progress: BTreeMap<(u64, u32), ProgressRow>,
    attempts: Vec<AttemptRow>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single mutex stands in for the storage engine's transaction isolation,
/// so multi-row operations are atomic here too.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn register_user(
        &self,
        user: &NewUser,
        total_modules: u32,
    ) -> Result<UserRecord, StorageError> {
        let mut state = self.lock()?;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict);
        }
        state.next_user_id += 1;
        let record = UserRecord {
            id: UserId::new(state.next_user_id),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            last_login: None,
        };
        state.users.push(record.clone());
        for number in 1..=total_modules {
            let module = ModuleNumber::new(number);
            state
                .progress
                .insert((record.id.value(), number), ProgressRow::initial(module));
        }
        Ok(record)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StorageError::NotFound)?;
        user.last_login = Some(at);
        Ok(())
    }
}

#[async_trait]
impl ModuleRepository for InMemoryRepository {
    async fn seed_modules(&self, entries: &[ModuleEntry]) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        for entry in entries {
            if !state.modules.iter().any(|m| m.number() == entry.number()) {
                state.modules.push(entry.clone());
            }
        }
        state.modules.sort_by_key(ModuleEntry::number);
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<ModuleEntry>, StorageError> {
        let state = self.lock()?;
        Ok(state.modules.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn unlocked_modules(&self, user: UserId) -> Result<Vec<UnlockedModule>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .progress
            .iter()
            .filter(|((uid, _), row)| *uid == user.value() && row.unlocked)
            .map(|((_, module), row)| UnlockedModule {
                module_number: ModuleNumber::new(*module),
                completed: row.completed,
            })
            .collect())
    }

    async fn progress_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        let state = self.lock()?;
        state
            .progress
            .get(&(user.value(), module.value()))
            .map(|row| {
                ModuleProgress::from_persisted(
                    user,
                    module,
                    row.unlocked,
                    row.completed,
                    row.completion_date,
                    row.study_time_secs,
                    row.attempts,
                )
                .map_err(|e: ProgressError| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn add_study_time(
        &self,
        user: UserId,
        module: ModuleNumber,
        delta_secs: u64,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if let Some(row) = state.progress.get_mut(&(user.value(), module.value())) {
            row.study_time_secs = row.study_time_secs.saturating_add(delta_secs);
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        write: &AttemptWrite,
        effects: &ProgressEffects,
    ) -> Result<u32, StorageError> {
        let mut state = self.lock()?;
        let pair = (write.user_id.value(), write.module_number.value());

        let attempt_number = state
            .attempts
            .iter()
            .filter(|a| {
                a.write.user_id == write.user_id && a.write.module_number == write.module_number
            })
            .count() as u32
            + 1;

        state.attempts.push(AttemptRow {
            write: write.clone(),
            attempt_number,
        });

        if let Some(row) = state.progress.get_mut(&pair) {
            row.attempts = attempt_number;
            if effects.complete {
                row.unlocked = true;
                row.completed = true;
                row.completion_date = Some(write.recorded_at);
            }
        }

        if let Some(next) = effects.unlock_next {
            state
                .progress
                .entry((write.user_id.value(), next.value()))
                .or_insert_with(ProgressRow::unlocked_row)
                .unlocked = true;
        }

        Ok(attempt_number)
    }

    async fn attempts_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<&AttemptRow> = state
            .attempts
            .iter()
            .filter(|a| a.write.user_id == user && a.write.module_number == module)
            .collect();
        rows.sort_by_key(|a| a.attempt_number);
        rows.into_iter()
            .map(|a| {
                QuizAttempt::from_persisted(
                    a.write.user_id,
                    a.write.module_number,
                    a.write.score,
                    a.write.total_questions,
                    a.write.time_taken_secs,
                    a.attempt_number,
                    a.write.recorded_at,
                )
                .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn user_stats(&self, user: UserId) -> Result<UserStats, StorageError> {
        let state = self.lock()?;
        let completed_modules = state
            .progress
            .iter()
            .filter(|((uid, _), row)| *uid == user.value() && row.completed)
            .count() as u32;
        let total_study_time_secs = state
            .progress
            .iter()
            .filter(|((uid, _), _)| *uid == user.value())
            .map(|(_, row)| row.study_time_secs)
            .sum();

        let scores: Vec<u32> = state
            .attempts
            .iter()
            .filter(|a| a.write.user_id == user)
            .map(|a| a.write.score)
            .collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            f64::from(scores.iter().sum::<u32>()) / scores.len() as f64
        };

        Ok(UserStats {
            completed_modules,
            average_score,
            total_study_time_secs,
        })
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub modules: Arc<dyn ModuleRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let modules: Arc<dyn ModuleRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            users,
            modules,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::time::fixed_now;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: "hash".to_string(),
            email: None,
            created_at: fixed_now(),
        }
    }

    fn attempt(user: UserId, module: u32, score: u32) -> AttemptWrite {
        AttemptWrite {
            user_id: user,
            module_number: ModuleNumber::new(module),
            score,
            total_questions: 10,
            time_taken_secs: 120,
            recorded_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn registration_seeds_progress_rows() {
        let repo = InMemoryRepository::new();
        let user = repo.register_user(&new_user("recruit"), 5).await.unwrap();

        let unlocked = repo.unlocked_modules(user.id).await.unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].module_number, ModuleNumber::new(1));
        assert!(!unlocked[0].completed);

        for number in 2..=5 {
            let progress = repo
                .progress_for(user.id, ModuleNumber::new(number))
                .await
                .unwrap()
                .unwrap();
            assert!(!progress.is_unlocked());
            assert!(!progress.is_completed());
        }
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = InMemoryRepository::new();
        repo.register_user(&new_user("recruit"), 3).await.unwrap();
        let err = repo.register_user(&new_user("recruit"), 3).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn attempt_numbers_count_up_regardless_of_outcome() {
        let repo = InMemoryRepository::new();
        let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();
        let effects = ProgressEffects {
            complete: false,
            unlock_next: None,
        };

        for expected in 1..=3 {
            let n = repo
                .record_attempt(&attempt(user.id, 1, 4), &effects)
                .await
                .unwrap();
            assert_eq!(n, expected);
        }

        let history = repo
            .attempts_for(user.id, ModuleNumber::new(1))
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].attempt_number(), 3);
    }

    #[tokio::test]
    async fn passing_attempt_completes_and_unlocks_next() {
        let repo = InMemoryRepository::new();
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
        assert_eq!(first.completion_date(), Some(fixed_now()));

        let second = repo
            .progress_for(user.id, ModuleNumber::new(2))
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_unlocked());
        assert!(!second.is_completed());
    }

    #[tokio::test]
    async fn failing_attempt_never_revokes_earlier_unlock() {
        let repo = InMemoryRepository::new();
        let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();

        repo.record_attempt(
            &attempt(user.id, 1, 9),
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
        assert!(first.is_completed(), "completion is never un-set");

        let second = repo
            .progress_for(user.id, ModuleNumber::new(2))
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_unlocked(), "unlock is never revoked");
    }

    #[tokio::test]
    async fn stats_are_zero_without_history() {
        let repo = InMemoryRepository::new();
        let user = repo.register_user(&new_user("recruit"), 3).await.unwrap();
        let stats = repo.user_stats(user.id).await.unwrap();
        assert_eq!(stats, UserStats::default());
    }

    #[tokio::test]
    async fn study_time_accumulates_and_ignores_missing_rows() {
        let repo = InMemoryRepository::new();
        let user = repo.register_user(&new_user("recruit"), 2).await.unwrap();

        repo.add_study_time(user.id, ModuleNumber::new(1), 30)
            .await
            .unwrap();
        repo.add_study_time(user.id, ModuleNumber::new(1), 12)
            .await
            .unwrap();
        // Module 9 has no row; this must be a silent no-op.
        repo.add_study_time(user.id, ModuleNumber::new(9), 60)
            .await
            .unwrap();

        let progress = repo
            .progress_for(user.id, ModuleNumber::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.study_time_secs(), 42);

        let stats = repo.user_stats(user.id).await.unwrap();
        assert_eq!(stats.total_study_time_secs, 42);
    }
}
