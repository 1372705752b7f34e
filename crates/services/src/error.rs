//! Shared error types for the services crate.

use std::path::PathBuf;
use thiserror::Error;

use drill_core::model::{
    BankError, ModuleError, ModuleNumber, ParseAnswerKeyError, ParseDifficultyError, QuestionError,
};
use drill_core::quiz::QuizError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AuthService`.
///
/// `DuplicateUsername` and `InvalidCredentials` are expected, user-facing
/// outcomes that the caller renders as a retryable message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("username is already taken")]
    DuplicateUsername,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("password hashing failed")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Session(#[from] SessionFileError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the cross-process session handoff file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionFileError {
    #[error("no active session")]
    NotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("module {0} is not in the catalog")]
    UnknownModule(ModuleNumber),

    #[error("module {0} is still locked")]
    ModuleLocked(ModuleNumber),

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while building a `ModuleCatalog`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog has no modules")]
    Empty,

    #[error("module numbers must run 1..N without gaps: expected {expected}, found {found}")]
    NonContiguous { expected: u32, found: u32 },

    #[error("bank file {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("bank file {path}: question {index} has {got} options, expected 4")]
    WrongOptionCount {
        path: PathBuf,
        index: usize,
        got: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Answer(#[from] ParseAnswerKeyError),

    #[error(transparent)]
    Difficulty(#[from] ParseDifficultyError),
}

/// Errors emitted by `ModuleLauncher` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    #[error("failed to spawn module {module}")]
    Spawn {
        module: ModuleNumber,
        #[source]
        source: std::io::Error,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
