mod attempt;
mod ids;
mod module;
mod progress;
mod question;
mod user;

pub use ids::{ModuleNumber, ParseIdError, UserId};

pub use attempt::{AttemptError, QuizAttempt};
pub use module::{ModuleEntry, ModuleError};
pub use progress::{ModuleProgress, ProgressError, UserStats};
pub use question::{
    AnswerKey, BankError, Difficulty, ParseAnswerKeyError, ParseDifficultyError, Question,
    QuestionBank, QuestionError,
};
pub use user::{User, UserError};
