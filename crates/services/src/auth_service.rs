//! Registration and login.
//!
//! Passwords are hashed with bcrypt (per-user salt, slow digest) and checked
//! with its constant-time verify. The stored hash never crosses into the
//! domain `User` type.

use drill_core::Clock;
use drill_core::model::User;
use storage::repository::{NewUser, Storage};

use crate::error::{AuthError, SessionFileError};
use crate::session_file::{SessionFile, SessionHandoff};

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

pub struct AuthService {
    storage: Storage,
    session_file: SessionFile,
    total_modules: u32,
    hash_cost: u32,
    clock: Clock,
}

impl AuthService {
    #[must_use]
    pub fn new(storage: Storage, session_file: SessionFile, total_modules: u32) -> Self {
        Self {
            storage,
            session_file,
            total_modules,
            hash_cost: bcrypt::DEFAULT_COST,
            clock: Clock::default(),
        }
    }

    /// Override the clock, mainly for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Override the bcrypt cost factor. Tests use the minimum cost to stay
    /// fast; production keeps the default.
    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Create a user plus their initial progress rows (module 1 unlocked,
    /// everything else locked) in one atomic registration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateUsername` when the name is taken,
    /// `AuthError::PasswordTooShort` on a weak password, or storage/hash
    /// failures.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
    ) -> Result<User, AuthError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }

        let password_hash = bcrypt::hash(password, self.hash_cost)?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            email,
            created_at: self.clock.now(),
        };

        let record = self
            .storage
            .users
            .register_user(&new_user, self.total_modules)
            .await
            .map_err(|e| match e {
                storage::repository::StorageError::Conflict => AuthError::DuplicateUsername,
                other => AuthError::Storage(other),
            })?;

        tracing::info!(user_id = %record.id, username, "registered user");
        Ok(record.into_user()?)
    }

    /// Verify credentials, stamp the login, and publish the session handoff
    /// for the module processes.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on a failed check, or
    /// storage/session-file failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(record) = self.storage.users.find_by_username(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !bcrypt::verify(password, &record.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        self.storage.users.touch_last_login(record.id, now).await?;

        self.session_file.save(&SessionHandoff {
            user_id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
            login_time: now,
        })?;

        tracing::info!(user_id = %record.id, username, "login succeeded");
        Ok(record.into_user()?)
    }

    /// End the session by removing the handoff file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` on filesystem failure.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.session_file.clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Resolve the identity in the current handoff file, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` (via `AuthError::Session`) when no session
    /// is active or the referenced user no longer exists.
    pub async fn current_user(&self) -> Result<User, AuthError> {
        let handoff = self.session_file.load()?;
        let Some(record) = self.storage.users.find_by_id(handoff.user_id).await? else {
            return Err(AuthError::Session(SessionFileError::NotFound));
        };
        Ok(record.into_user()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::time::fixed_clock;

    fn build_service(dir: &tempfile::TempDir) -> AuthService {
        AuthService::new(
            Storage::in_memory(),
            SessionFile::new(dir.path().join("session.json")),
            3,
        )
        .with_hash_cost(4)
        .with_clock(fixed_clock())
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);

        let registered = auth
            .register("recruit", "correct-horse", None)
            .await
            .unwrap();
        let logged_in = auth.login("recruit", "correct-horse").await.unwrap();
        assert_eq!(logged_in.id(), registered.id());
        assert!(logged_in.last_login().is_none(), "stamped after the read");
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);
        auth.register("recruit", "correct-horse", None)
            .await
            .unwrap();

        // A single-character mutation must fail.
        let err = auth.login("recruit", "correct-hoRse").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_user_is_indistinguishable_from_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);

        let err = auth.login("nobody", "whatever-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);
        auth.register("recruit", "correct-horse", None)
            .await
            .unwrap();

        let err = auth
            .register("recruit", "another-pass", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);

        let err = auth.register("recruit", "short", None).await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort { min: 6 }));
        assert!(matches!(
            auth.login("recruit", "short").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn login_publishes_handoff_and_logout_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let auth = build_service(&dir);
        let user = auth
            .register("recruit", "correct-horse", Some("r@example.com".into()))
            .await
            .unwrap();
        auth.login("recruit", "correct-horse").await.unwrap();

        let current = auth.current_user().await.unwrap();
        assert_eq!(current.id(), user.id());

        auth.logout().unwrap();
        let err = auth.current_user().await.unwrap_err();
        assert!(matches!(err, AuthError::Session(SessionFileError::NotFound)));
    }
}
