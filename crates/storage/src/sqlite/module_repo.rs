use chrono::Utc;
use drill_core::model::ModuleEntry;

use super::SqliteRepository;
use super::mapping::{map_module_row, module_to_i64, read_err, write_err};
use crate::repository::{ModuleRepository, StorageError};

#[async_trait::async_trait]
impl ModuleRepository for SqliteRepository {
    async fn seed_modules(&self, entries: &[ModuleEntry]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO modules (module_number, title, content_reference, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(module_number) DO NOTHING
                ",
            )
            .bind(module_to_i64(entry.number()))
            .bind(entry.title())
            .bind(entry.content_reference())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<ModuleEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT module_number, title, content_reference
            FROM modules
            ORDER BY module_number ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_module_row).collect()
    }
}
