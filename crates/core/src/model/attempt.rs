use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ModuleNumber, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("score {score} exceeds total questions {total}")]
    ScoreOutOfRange { score: u32, total: u32 },

    #[error("attempt_number must be 1-based")]
    ZeroAttemptNumber,
}

/// Immutable historical record of one finished quiz run.
///
/// Append-only; abandoned quizzes never produce one. `attempt_number` is the
/// 1-indexed count of attempts for the (user, module) pair, assigned by the
/// store at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    user_id: UserId,
    module_number: ModuleNumber,
    score: u32,
    total_questions: u32,
    time_taken_secs: u64,
    attempt_number: u32,
    recorded_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the score exceeds the question count or the
    /// attempt number is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        module_number: ModuleNumber,
        score: u32,
        total_questions: u32,
        time_taken_secs: u64,
        attempt_number: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if score > total_questions {
            return Err(AttemptError::ScoreOutOfRange {
                score,
                total: total_questions,
            });
        }
        if attempt_number == 0 {
            return Err(AttemptError::ZeroAttemptNumber);
        }
        Ok(Self {
            user_id,
            module_number,
            score,
            total_questions,
            time_taken_secs,
            attempt_number,
            recorded_at,
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
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_taken_secs(&self) -> u64 {
        self.time_taken_secs
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
