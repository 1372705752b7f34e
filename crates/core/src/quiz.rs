//! In-memory state machine for one timed quiz attempt.
//!
//! The machine is single-threaded and cooperative: it only moves when the
//! caller drives it (`select_answer`, `submit`, `advance`, `check_timeout`)
//! and it never touches persistent state itself. Converting a completed run
//! into a stored attempt is the services layer's job.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AnswerKey, ModuleNumber, Question};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizPolicyError {
    #[error("pass threshold {threshold} exceeds questions per quiz {questions}")]
    ThresholdTooHigh { threshold: u32, questions: u32 },
}

/// Tunable quiz rules shared by every module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPolicy {
    questions_per_quiz: u32,
    pass_threshold: u32,
    time_limit_secs: u64,
    min_study_secs: u64,
}

impl QuizPolicy {
    /// # Errors
    ///
    /// Returns `QuizPolicyError::ThresholdTooHigh` if the threshold could
    /// never be reached.
    pub fn new(
        questions_per_quiz: u32,
        pass_threshold: u32,
        time_limit_secs: u64,
        min_study_secs: u64,
    ) -> Result<Self, QuizPolicyError> {
        if pass_threshold > questions_per_quiz {
            return Err(QuizPolicyError::ThresholdTooHigh {
                threshold: pass_threshold,
                questions: questions_per_quiz,
            });
        }
        Ok(Self {
            questions_per_quiz,
            pass_threshold,
            time_limit_secs,
            min_study_secs,
        })
    }

    #[must_use]
    pub fn questions_per_quiz(&self) -> u32 {
        self.questions_per_quiz
    }

    #[must_use]
    pub fn pass_threshold(&self) -> u32 {
        self.pass_threshold
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u64 {
        self.time_limit_secs
    }

    /// Minimum study duration the material viewer enforces before a quiz may
    /// start. The core only records study time; it never enforces this.
    #[must_use]
    pub fn min_study_secs(&self) -> u64 {
        self.min_study_secs
    }

    #[must_use]
    pub fn is_passing(&self, score: u32) -> bool {
        score >= self.pass_threshold
    }
}

impl Default for QuizPolicy {
    /// Ten questions, pass at 8, five-minute limit, five seconds of study
    /// before the quiz becomes available.
    fn default() -> Self {
        Self {
            questions_per_quiz: 10,
            pass_threshold: 8,
            time_limit_secs: 300,
            min_study_secs: 5,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz started with no questions")]
    NoQuestions,

    /// The caller drove the machine from a state that does not permit the
    /// operation. This is a programming-contract violation on the caller
    /// (UI) side, not a recoverable runtime condition.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    AwaitingAnswer { index: usize },
    AnswerSubmitted { index: usize },
    Completed { score: u32 },
}

/// Result of `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextQuestion(usize),
    Completed(u32),
}

/// One graded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub index: usize,
    pub selected: AnswerKey,
    pub correct: bool,
}

/// Final report of a completed run, ready to be persisted as an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizReport {
    pub module_number: ModuleNumber,
    pub score: u32,
    pub total_questions: u32,
    pub time_taken_secs: u64,
    pub timed_out: bool,
}

enum Step {
    Awaiting,
    Submitted,
}

/// One quiz run over a sampled question list.
///
/// States: `AwaitingAnswer(i)` -> `AnswerSubmitted(i)` ->
/// `AwaitingAnswer(i + 1)` | `Completed`. A tentative selection may be
/// changed freely before `submit`; the wall-clock limit is checked lazily
/// via `check_timeout`, so detection granularity equals the caller's polling
/// interval.
pub struct QuizSession {
    module_number: ModuleNumber,
    questions: Vec<Question>,
    policy: QuizPolicy,
    current: usize,
    step: Step,
    pending: Option<AnswerKey>,
    submitted: Vec<SubmittedAnswer>,
    score: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    timed_out: bool,
}

impl QuizSession {
    /// Start a run over an already-sampled question list.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` if the list is empty.
    pub fn new(
        module_number: ModuleNumber,
        questions: Vec<Question>,
        policy: QuizPolicy,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(Self {
            module_number,
            questions,
            policy,
            current: 0,
            step: Step::Awaiting,
            pending: None,
            submitted: Vec::new(),
            score: 0,
            started_at,
            completed_at: None,
            timed_out: false,
        })
    }

    #[must_use]
    pub fn module_number(&self) -> ModuleNumber {
        self.module_number
    }

    #[must_use]
    pub fn policy(&self) -> &QuizPolicy {
        &self.policy
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.submitted.len()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        if self.is_complete() {
            QuizPhase::Completed { score: self.score }
        } else {
            match self.step {
                Step::Awaiting => QuizPhase::AwaitingAnswer {
                    index: self.current,
                },
                Step::Submitted => QuizPhase::AnswerSubmitted {
                    index: self.current,
                },
            }
        }
    }

    /// The question currently on screen, if the run is still going.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.is_complete() {
            None
        } else {
            self.questions.get(self.current)
        }
    }

    /// The tentative, not yet submitted choice.
    #[must_use]
    pub fn pending_answer(&self) -> Option<AnswerKey> {
        self.pending
    }

    #[must_use]
    pub fn submitted_answers(&self) -> &[SubmittedAnswer] {
        &self.submitted
    }

    /// Store or replace the tentative choice for the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` unless the machine is awaiting
    /// an answer.
    pub fn select_answer(&mut self, key: AnswerKey) -> Result<(), QuizError> {
        match self.phase() {
            QuizPhase::AwaitingAnswer { .. } => {
                self.pending = Some(key);
                Ok(())
            }
            QuizPhase::AnswerSubmitted { .. } => Err(QuizError::InvalidTransition {
                action: "select an answer",
                state: "the answer is already submitted",
            }),
            QuizPhase::Completed { .. } => Err(QuizError::InvalidTransition {
                action: "select an answer",
                state: "the quiz is completed",
            }),
        }
    }

    /// Grade the tentative choice against the current question.
    ///
    /// Returns whether the submission was correct.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` if no tentative choice exists
    /// or the machine is not awaiting an answer.
    pub fn submit(&mut self) -> Result<bool, QuizError> {
        match self.phase() {
            QuizPhase::AwaitingAnswer { index } => {
                let Some(selected) = self.pending.take() else {
                    return Err(QuizError::InvalidTransition {
                        action: "submit",
                        state: "no answer is selected",
                    });
                };
                let correct = self.questions[index].is_correct(selected);
                if correct {
                    self.score += 1;
                }
                self.submitted.push(SubmittedAnswer {
                    index,
                    selected,
                    correct,
                });
                self.step = Step::Submitted;
                Ok(correct)
            }
            QuizPhase::AnswerSubmitted { .. } => Err(QuizError::InvalidTransition {
                action: "submit",
                state: "the answer is already submitted",
            }),
            QuizPhase::Completed { .. } => Err(QuizError::InvalidTransition {
                action: "submit",
                state: "the quiz is completed",
            }),
        }
    }

    /// Move past a submitted answer: on to the next question, or into
    /// `Completed` after the last one.
    ///
    /// `now` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidTransition` unless an answer was just
    /// submitted.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, QuizError> {
        match self.phase() {
            QuizPhase::AnswerSubmitted { index } => {
                if index + 1 == self.questions.len() {
                    self.completed_at = Some(now);
                    Ok(Advance::Completed(self.score))
                } else {
                    self.current = index + 1;
                    self.step = Step::Awaiting;
                    Ok(Advance::NextQuestion(self.current))
                }
            }
            QuizPhase::AwaitingAnswer { .. } => Err(QuizError::InvalidTransition {
                action: "advance",
                state: "no answer is submitted",
            }),
            QuizPhase::Completed { .. } => Err(QuizError::InvalidTransition {
                action: "advance",
                state: "the quiz is completed",
            }),
        }
    }

    /// Lazy timeout poll.
    ///
    /// When the elapsed wall-clock time exceeds the policy limit and the run
    /// is not yet complete, force-completes with the score accumulated so
    /// far; every unanswered question counts as a miss. Returns true when
    /// this call completed the run.
    pub fn check_timeout(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_complete() {
            return false;
        }
        let elapsed = (now - self.started_at).num_seconds();
        if elapsed > self.policy.time_limit_secs as i64 {
            self.completed_at = Some(now);
            self.timed_out = true;
            true
        } else {
            false
        }
    }

    /// Final report, available once the run is complete.
    #[must_use]
    pub fn report(&self) -> Option<QuizReport> {
        let completed_at = self.completed_at?;
        let time_taken_secs = u64::try_from((completed_at - self.started_at).num_seconds())
            .unwrap_or(0);
        Some(QuizReport {
            module_number: self.module_number,
            score: self.score,
            total_questions: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            time_taken_secs,
            timed_out: self.timed_out,
        })
    }
}

impl std::fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("module_number", &self.module_number)
            .field("questions_len", &self.questions.len())
            .field("phase", &self.phase())
            .field("score", &self.score)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("timed_out", &self.timed_out)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build_question(n: usize) -> Question {
        Question::new(
            format!("Question {n}?"),
            [
                "A. one".to_string(),
                "B. two".to_string(),
                "C. three".to_string(),
                "D. four".to_string(),
            ],
            AnswerKey::D,
            Difficulty::Easy,
            "General",
        )
        .unwrap()
    }

    fn build_session(total: usize) -> QuizSession {
        QuizSession::new(
            ModuleNumber::new(1),
            (0..total).map(build_question).collect(),
            QuizPolicy::default(),
            fixed_now(),
        )
        .unwrap()
    }

    fn answer(session: &mut QuizSession, key: AnswerKey) {
        session.select_answer(key).unwrap();
        session.submit().unwrap();
        session.advance(fixed_now() + Duration::seconds(10)).unwrap();
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = QuizSession::new(
            ModuleNumber::new(1),
            Vec::new(),
            QuizPolicy::default(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, QuizError::NoQuestions);
    }

    #[test]
    fn policy_rejects_unreachable_threshold() {
        let err = QuizPolicy::new(10, 11, 300, 5).unwrap_err();
        assert_eq!(
            err,
            QuizPolicyError::ThresholdTooHigh {
                threshold: 11,
                questions: 10
            }
        );
    }

    #[test]
    fn full_run_scores_and_completes() {
        let mut session = build_session(3);
        assert_eq!(session.phase(), QuizPhase::AwaitingAnswer { index: 0 });

        answer(&mut session, AnswerKey::D);
        answer(&mut session, AnswerKey::A);

        session.select_answer(AnswerKey::D).unwrap();
        assert!(session.submit().unwrap());
        let advanced = session.advance(fixed_now() + Duration::seconds(45)).unwrap();
        assert_eq!(advanced, Advance::Completed(2));

        assert_eq!(session.phase(), QuizPhase::Completed { score: 2 });
        let report = session.report().unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.total_questions, 3);
        assert_eq!(report.time_taken_secs, 45);
        assert!(!report.timed_out);
    }

    #[test]
    fn selection_can_change_before_submit() {
        let mut session = build_session(1);
        session.select_answer(AnswerKey::A).unwrap();
        session.select_answer(AnswerKey::D).unwrap();
        assert_eq!(session.pending_answer(), Some(AnswerKey::D));
        assert!(session.submit().unwrap());
        assert_eq!(session.score(), 1);
    }

    #[test]
    fn submit_without_selection_is_invalid() {
        let mut session = build_session(2);
        let err = session.submit().unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { .. }));
    }

    #[test]
    fn advance_before_submit_is_invalid() {
        let mut session = build_session(2);
        session.select_answer(AnswerKey::B).unwrap();
        let err = session.advance(fixed_now()).unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { .. }));
    }

    #[test]
    fn select_after_submit_is_invalid() {
        let mut session = build_session(2);
        session.select_answer(AnswerKey::B).unwrap();
        session.submit().unwrap();
        let err = session.select_answer(AnswerKey::C).unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { .. }));
    }

    #[test]
    fn operations_after_completion_are_invalid() {
        let mut session = build_session(1);
        session.select_answer(AnswerKey::D).unwrap();
        session.submit().unwrap();
        session.advance(fixed_now()).unwrap();

        assert!(session.select_answer(AnswerKey::A).is_err());
        assert!(session.submit().is_err());
        assert!(session.advance(fixed_now()).is_err());
        assert!(session.current_question().is_none());
    }

    #[test]
    fn timeout_completes_with_partial_score() {
        // Three of ten answered, two correct, then the clock runs out.
        let mut session = build_session(10);
        answer(&mut session, AnswerKey::D);
        answer(&mut session, AnswerKey::D);
        answer(&mut session, AnswerKey::A);

        let within_limit = fixed_now() + Duration::seconds(300);
        assert!(!session.check_timeout(within_limit));
        assert!(!session.is_complete());

        let past_limit = fixed_now() + Duration::seconds(301);
        assert!(session.check_timeout(past_limit));
        assert!(session.is_complete());

        let report = session.report().unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.total_questions, 10);
        assert_eq!(report.time_taken_secs, 301);
        assert!(report.timed_out);
    }

    #[test]
    fn timeout_poll_is_a_noop_after_completion() {
        let mut session = build_session(1);
        session.select_answer(AnswerKey::D).unwrap();
        session.submit().unwrap();
        session.advance(fixed_now()).unwrap();

        assert!(!session.check_timeout(fixed_now() + Duration::seconds(9999)));
        assert!(!session.report().unwrap().timed_out);
    }
}
