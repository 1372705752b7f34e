//! Wires storage and the catalog into the service set the front end uses.

use std::path::PathBuf;
use std::sync::Arc;

use storage::repository::Storage;

use crate::auth_service::AuthService;
use crate::catalog::ModuleCatalog;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::session_file::SessionFile;

/// The assembled service set.
pub struct AppServices {
    pub storage: Storage,
    pub catalog: Arc<ModuleCatalog>,
    pub auth: AuthService,
    pub progress: ProgressService,
    pub quiz: QuizService,
}

impl AppServices {
    /// Connect to `SQLite`, run migrations, seed the module catalog, and
    /// build the services.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` when the database cannot be prepared.
    pub async fn bootstrap(
        database_url: &str,
        catalog: ModuleCatalog,
        session_path: impl Into<PathBuf>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(database_url).await?;
        Self::with_storage(storage, catalog, session_path).await
    }

    /// Build the services over an existing storage backend (tests use the
    /// in-memory one).
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` when catalog seeding fails.
    pub async fn with_storage(
        storage: Storage,
        catalog: ModuleCatalog,
        session_path: impl Into<PathBuf>,
    ) -> Result<Self, AppServicesError> {
        storage.modules.seed_modules(&catalog.entries()).await?;
        let catalog = Arc::new(catalog);

        let auth = AuthService::new(
            storage.clone(),
            SessionFile::new(session_path),
            catalog.total_modules(),
        );
        let progress = ProgressService::new(storage.clone());
        let quiz = QuizService::new(storage.clone(), Arc::clone(&catalog));

        Ok(Self {
            storage,
            catalog,
            auth,
            progress,
            quiz,
        })
    }
}
