#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod catalog;
pub mod error;
pub mod launcher;
pub mod progress_service;
pub mod quiz_service;
pub mod session_file;

pub use drill_core::Clock;

pub use error::{
    AppServicesError, AuthError, CatalogError, LaunchError, ProgressServiceError,
    QuizServiceError, SessionFileError,
};

pub use app_services::AppServices;
pub use auth_service::{AuthService, MIN_PASSWORD_LENGTH};
pub use catalog::{CatalogModule, ModuleCatalog};
pub use launcher::{LaunchCommand, ModuleLauncher, NoopLauncher, RegistryLauncher};
pub use progress_service::ProgressService;
pub use quiz_service::{ActiveQuiz, QuizEvent, QuizOutcome, QuizService};
pub use session_file::{SessionFile, SessionHandoff};
