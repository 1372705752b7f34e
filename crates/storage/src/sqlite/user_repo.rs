use chrono::{DateTime, Utc};
use drill_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{map_user_row, read_err, ser, user_id_to_i64, write_err};
use crate::repository::{NewUser, StorageError, UserRecord, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn register_user(
        &self,
        user: &NewUser,
        total_modules: u32,
    ) -> Result<UserRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let result = sqlx::query(
            r"
            INSERT INTO users (username, password_hash, email, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(user.username.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.email.as_deref())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let user_id = result.last_insert_rowid();

        // One progress row per module; only the first is unlocked.
        for number in 1..=i64::from(total_modules) {
            sqlx::query(
                r"
                INSERT INTO progress (user_id, module_number, is_unlocked)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(user_id)
            .bind(number)
            .bind(number == 1)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;

        Ok(UserRecord {
            id: UserId::new(u64::try_from(user_id).map_err(|e| ser(e))?),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            last_login: None,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, password_hash, email, created_at, last_login
            FROM users
            WHERE username = ?1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, username, password_hash, email, created_at, last_login
            FROM users
            WHERE id = ?1
            ",
        )
        .bind(user_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE users SET last_login = ?1 WHERE id = ?2
            ",
        )
        .bind(at)
        .bind(user_id_to_i64(id)?)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
