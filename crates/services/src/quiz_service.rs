//! Orchestrates one quiz attempt against the progress store.
//!
//! The state machine itself lives in `drill_core::quiz`; this layer checks
//! the unlock gate, samples the bank, and turns a completed run into exactly
//! one recorded attempt with its completion/unlock side effects. Abandoning
//! a run writes nothing, which is what separates "gave up" from "attempted
//! and scored low".

use std::sync::Arc;

use drill_core::Clock;
use drill_core::model::{AnswerKey, ModuleNumber, UserId};
use drill_core::quiz::{Advance, QuizError, QuizPolicy, QuizSession};
use storage::repository::{AttemptWrite, ProgressEffects, Storage};

use crate::catalog::ModuleCatalog;
use crate::error::QuizServiceError;

/// Final outcome of a recorded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub module_number: ModuleNumber,
    pub score: u32,
    pub total_questions: u32,
    pub time_taken_secs: u64,
    pub passed: bool,
    pub timed_out: bool,
    pub attempt_number: u32,
    pub unlocked_next: Option<ModuleNumber>,
}

/// What `advance` produced: the next question index, or the recorded
/// outcome of the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    NextQuestion(usize),
    Completed(QuizOutcome),
}

/// One in-flight quiz run for one user.
///
/// Holds the core session plus the recorded outcome once the run reaches the
/// store. Dropping it without completing is an abandonment and leaves no
/// trace.
#[derive(Debug)]
pub struct ActiveQuiz {
    user_id: UserId,
    session: QuizSession,
    outcome: Option<QuizOutcome>,
}

impl ActiveQuiz {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }
}

pub struct QuizService {
    storage: Storage,
    catalog: Arc<ModuleCatalog>,
    policy: QuizPolicy,
    clock: Clock,
}

impl QuizService {
    #[must_use]
    pub fn new(storage: Storage, catalog: Arc<ModuleCatalog>) -> Self {
        Self {
            storage,
            catalog,
            policy: QuizPolicy::default(),
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: QuizPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the clock, mainly for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &QuizPolicy {
        &self.policy
    }

    /// Start a run: verify the module exists and is unlocked for this user,
    /// then sample the bank.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModule`, `ModuleLocked`, `Bank` (undersized bank), or
    /// storage failures.
    pub async fn start(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<ActiveQuiz, QuizServiceError> {
        let Some(bank) = self.catalog.bank(module) else {
            return Err(QuizServiceError::UnknownModule(module));
        };

        let unlocked = self
            .storage
            .progress
            .progress_for(user, module)
            .await?
            .is_some_and(|p| p.is_unlocked());
        if !unlocked {
            return Err(QuizServiceError::ModuleLocked(module));
        }

        let mut rng = rand::rng();
        let questions = bank.sample(self.policy.questions_per_quiz() as usize, &mut rng)?;
        let session = QuizSession::new(module, questions, self.policy.clone(), self.clock.now())?;

        tracing::debug!(user_id = %user, %module, "quiz started");
        Ok(ActiveQuiz {
            user_id: user,
            session,
            outcome: None,
        })
    }

    /// Store or replace the tentative choice for the current question.
    ///
    /// # Errors
    ///
    /// Propagates `QuizError::InvalidTransition` from the state machine.
    pub fn select_answer(
        &self,
        quiz: &mut ActiveQuiz,
        key: AnswerKey,
    ) -> Result<(), QuizServiceError> {
        Ok(quiz.session.select_answer(key)?)
    }

    /// Grade the tentative choice; returns whether it was correct.
    ///
    /// # Errors
    ///
    /// Propagates `QuizError::InvalidTransition` from the state machine.
    pub fn submit(&self, quiz: &mut ActiveQuiz) -> Result<bool, QuizServiceError> {
        Ok(quiz.session.submit()?)
    }

    /// Move past a submitted answer. Completing the last question records
    /// the attempt before returning.
    ///
    /// # Errors
    ///
    /// Propagates state-machine errors; a storage failure while recording
    /// leaves the run completed but unrecorded, and `record_completed` can
    /// be retried.
    pub async fn advance(&self, quiz: &mut ActiveQuiz) -> Result<QuizEvent, QuizServiceError> {
        match quiz.session.advance(self.clock.now())? {
            Advance::NextQuestion(index) => Ok(QuizEvent::NextQuestion(index)),
            Advance::Completed(_) => {
                let outcome = self.record_completed(quiz).await?;
                Ok(QuizEvent::Completed(outcome))
            }
        }
    }

    /// Lazy timeout poll; the host event loop calls this between input
    /// events. Returns the recorded outcome when this poll expired the run.
    ///
    /// # Errors
    ///
    /// Returns storage failures from recording; the run stays retryable via
    /// `record_completed`.
    pub async fn poll_timeout(
        &self,
        quiz: &mut ActiveQuiz,
    ) -> Result<Option<QuizOutcome>, QuizServiceError> {
        if quiz.session.check_timeout(self.clock.now()) {
            let outcome = self.record_completed(quiz).await?;
            Ok(Some(outcome))
        } else {
            Ok(None)
        }
    }

    /// Record a completed run as one atomic attempt: attempt row, attempt
    /// counter, and (on a pass) completion plus successor unlock. Calling it
    /// again returns the already-recorded outcome.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` while the run is still going, or storage
    /// failures (nothing half-applied; safe to retry).
    pub async fn record_completed(
        &self,
        quiz: &mut ActiveQuiz,
    ) -> Result<QuizOutcome, QuizServiceError> {
        if let Some(outcome) = &quiz.outcome {
            return Ok(outcome.clone());
        }

        let report = quiz.session.report().ok_or(QuizError::InvalidTransition {
            action: "record the attempt",
            state: "the quiz is still in progress",
        })?;

        let passed = self.policy.is_passing(report.score);
        let unlock_next = passed
            .then(|| report.module_number.next())
            .filter(|next| next.value() <= self.catalog.total_modules());

        let write = AttemptWrite {
            user_id: quiz.user_id,
            module_number: report.module_number,
            score: report.score,
            total_questions: report.total_questions,
            time_taken_secs: report.time_taken_secs,
            recorded_at: self.clock.now(),
        };
        let effects = ProgressEffects {
            complete: passed,
            unlock_next,
        };

        let attempt_number = self.storage.progress.record_attempt(&write, &effects).await?;
        tracing::info!(
            user_id = %quiz.user_id,
            module = %report.module_number,
            score = report.score,
            attempt_number,
            passed,
            timed_out = report.timed_out,
            "quiz attempt recorded"
        );
        if let Some(next) = unlock_next {
            tracing::info!(user_id = %quiz.user_id, module = %next, "module unlocked");
        }

        let outcome = QuizOutcome {
            module_number: report.module_number,
            score: report.score,
            total_questions: report.total_questions,
            time_taken_secs: report.time_taken_secs,
            passed,
            timed_out: report.timed_out,
            attempt_number,
            unlocked_next: unlock_next,
        };
        quiz.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Give up on a run. No attempt row is written and the attempt counter
    /// stays put; only completed runs count.
    pub fn abandon(&self, quiz: ActiveQuiz) {
        tracing::debug!(
            user_id = %quiz.user_id,
            module = %quiz.session.module_number(),
            answered = quiz.session.answered_count(),
            "quiz abandoned without recording"
        );
        drop(quiz);
    }
}
