use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ModuleNumber, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("module {module} is marked completed but not unlocked")]
    CompletedButLocked { module: ModuleNumber },
}

/// Per-(user, module) unlock and completion state.
///
/// Exactly one record exists per pair. Module 1 starts unlocked, everything
/// else locked; unlocking module N+1 only happens as the side effect of a
/// passing attempt on module N. Once granted, unlock is never revoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    user_id: UserId,
    module_number: ModuleNumber,
    unlocked: bool,
    completed: bool,
    completion_date: Option<DateTime<Utc>>,
    study_time_secs: u64,
    attempts: u32,
}

impl ModuleProgress {
    /// State of a freshly registered user for one module: only the first
    /// module of the sequence is unlocked.
    #[must_use]
    pub fn initial(user_id: UserId, module_number: ModuleNumber) -> Self {
        Self {
            user_id,
            module_number,
            unlocked: module_number.is_first(),
            completed: false,
            completion_date: None,
            study_time_secs: 0,
            attempts: 0,
        }
    }

    /// Rehydrate a progress record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CompletedButLocked` if the stored row violates
    /// the completed-implies-unlocked invariant.
    pub fn from_persisted(
        user_id: UserId,
        module_number: ModuleNumber,
        unlocked: bool,
        completed: bool,
        completion_date: Option<DateTime<Utc>>,
        study_time_secs: u64,
        attempts: u32,
    ) -> Result<Self, ProgressError> {
        if completed && !unlocked {
            return Err(ProgressError::CompletedButLocked {
                module: module_number,
            });
        }
        Ok(Self {
            user_id,
            module_number,
            unlocked,
            completed,
            completion_date,
            study_time_secs,
            attempts,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn module_number(&self) -> ModuleNumber {
        self.module_number
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    /// Accumulated study time in seconds; only ever grows.
    #[must_use]
    pub fn study_time_secs(&self) -> u64 {
        self.study_time_secs
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Aggregate view over a user's progress and quiz history.
///
/// All fields default to zero so a brand-new user renders a dashboard
/// without any null or division-by-zero handling upstream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UserStats {
    pub completed_modules: u32,
    pub average_score: f64,
    pub total_study_time_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn initial_state_unlocks_only_first_module() {
        let first = ModuleProgress::initial(UserId::new(1), ModuleNumber::new(1));
        assert!(first.is_unlocked());
        assert!(!first.is_completed());

        let third = ModuleProgress::initial(UserId::new(1), ModuleNumber::new(3));
        assert!(!third.is_unlocked());
        assert!(!third.is_completed());
        assert_eq!(third.attempts(), 0);
        assert_eq!(third.study_time_secs(), 0);
    }

    #[test]
    fn rejects_completed_but_locked_row() {
        let err = ModuleProgress::from_persisted(
            UserId::new(1),
            ModuleNumber::new(2),
            false,
            true,
            Some(fixed_now()),
            0,
            1,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProgressError::CompletedButLocked {
                module: ModuleNumber::new(2)
            }
        );
    }

    #[test]
    fn accepts_completed_and_unlocked_row() {
        let progress = ModuleProgress::from_persisted(
            UserId::new(1),
            ModuleNumber::new(1),
            true,
            true,
            Some(fixed_now()),
            120,
            2,
        )
        .unwrap();
        assert!(progress.is_completed());
        assert_eq!(progress.completion_date(), Some(fixed_now()));
        assert_eq!(progress.study_time_secs(), 120);
    }

    #[test]
    fn stats_default_to_zero() {
        let stats = UserStats::default();
        assert_eq!(stats.completed_modules, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.total_study_time_secs, 0);
    }
}
