//! Read/update operations over a user's unlock, study-time, and stats state.

use drill_core::model::{ModuleNumber, QuizAttempt, UserId, UserStats};
use storage::repository::{Storage, UnlockedModule};

use crate::error::ProgressServiceError;

pub struct ProgressService {
    storage: Storage,
}

impl ProgressService {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Modules the user may enter, ascending by number.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn unlocked_modules(
        &self,
        user: UserId,
    ) -> Result<Vec<UnlockedModule>, ProgressServiceError> {
        Ok(self.storage.progress.unlocked_modules(user).await?)
    }

    /// Add study seconds for a module. The material viewer enforces any
    /// minimum-study gate; this only records the result, and a missing row
    /// degrades to a no-op inside the store.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn record_study_time(
        &self,
        user: UserId,
        module: ModuleNumber,
        delta_secs: u64,
    ) -> Result<(), ProgressServiceError> {
        tracing::debug!(user_id = %user, %module, delta_secs, "recording study time");
        Ok(self
            .storage
            .progress
            .add_study_time(user, module, delta_secs)
            .await?)
    }

    /// Quiz history for one module, ascending by attempt number.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn attempt_history(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Vec<QuizAttempt>, ProgressServiceError> {
        Ok(self.storage.progress.attempts_for(user, module).await?)
    }

    /// Dashboard aggregates; all zero for a user with no history.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on storage failure.
    pub async fn user_stats(&self, user: UserId) -> Result<UserStats, ProgressServiceError> {
        Ok(self.storage.progress.user_stats(user).await?)
    }

    /// Stats for display surfaces that must not crash on a read failure:
    /// falls back to zeroed stats and logs the error.
    pub async fn stats_or_default(&self, user: UserId) -> UserStats {
        match self.user_stats(user).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "stats read failed, showing zeros");
                UserStats::default()
            }
        }
    }
}
