use drill_core::model::{ModuleNumber, ModuleProgress, QuizAttempt, UserId, UserStats};

use super::SqliteRepository;
use super::mapping::{
    map_attempt_row, map_progress_row, map_stats_row, map_unlocked_row, module_to_i64, read_err,
    ser, user_id_to_i64, write_err,
};
use crate::repository::{
    AttemptWrite, ProgressEffects, ProgressRepository, StorageError, UnlockedModule,
};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn unlocked_modules(&self, user: UserId) -> Result<Vec<UnlockedModule>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT module_number, is_completed
            FROM progress
            WHERE user_id = ?1 AND is_unlocked = 1
            ORDER BY module_number ASC
            ",
        )
        .bind(user_id_to_i64(user)?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_unlocked_row).collect()
    }

    async fn progress_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, module_number, is_unlocked, is_completed,
                   completion_date, study_time, attempts
            FROM progress
            WHERE user_id = ?1 AND module_number = ?2
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(module_to_i64(module))
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn add_study_time(
        &self,
        user: UserId,
        module: ModuleNumber,
        delta_secs: u64,
    ) -> Result<(), StorageError> {
        let delta = i64::try_from(delta_secs)
            .map_err(|_| StorageError::Serialization("study_time overflow".into()))?;

        // A missing row matches zero rows and the update is a silent no-op.
        sqlx::query(
            r"
            UPDATE progress
            SET study_time = study_time + ?1
            WHERE user_id = ?2 AND module_number = ?3
            ",
        )
        .bind(delta)
        .bind(user_id_to_i64(user)?)
        .bind(module_to_i64(module))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn record_attempt(
        &self,
        write: &AttemptWrite,
        effects: &ProgressEffects,
    ) -> Result<u32, StorageError> {
        let user_id = user_id_to_i64(write.user_id)?;
        let module = module_to_i64(write.module_number);

        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let prior: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM quiz_results
            WHERE user_id = ?1 AND module_number = ?2
            ",
        )
        .bind(user_id)
        .bind(module)
        .fetch_one(&mut *tx)
        .await
        .map_err(read_err)?;

        let attempt_number = u32::try_from(prior)
            .map_err(|e| ser(e))?
            .checked_add(1)
            .ok_or_else(|| StorageError::Serialization("attempt_number overflow".into()))?;

        sqlx::query(
            r"
            INSERT INTO quiz_results
                (user_id, module_number, score, total_questions, time_taken,
                 attempt_number, quiz_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(user_id)
        .bind(module)
        .bind(i64::from(write.score))
        .bind(i64::from(write.total_questions))
        .bind(
            i64::try_from(write.time_taken_secs)
                .map_err(|_| StorageError::Serialization("time_taken overflow".into()))?,
        )
        .bind(i64::from(attempt_number))
        .bind(write.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        sqlx::query(
            r"
            UPDATE progress
            SET attempts = ?1
            WHERE user_id = ?2 AND module_number = ?3
            ",
        )
        .bind(i64::from(attempt_number))
        .bind(user_id)
        .bind(module)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        if effects.complete {
            // Completion implies unlocked; setting both keeps the invariant
            // even if the row was somehow still locked.
            sqlx::query(
                r"
                UPDATE progress
                SET is_unlocked = 1, is_completed = 1, completion_date = ?1
                WHERE user_id = ?2 AND module_number = ?3
                ",
            )
            .bind(write.recorded_at)
            .bind(user_id)
            .bind(module)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        if let Some(next) = effects.unlock_next {
            sqlx::query(
                r"
                INSERT INTO progress (user_id, module_number, is_unlocked)
                VALUES (?1, ?2, 1)
                ON CONFLICT(user_id, module_number) DO UPDATE SET is_unlocked = 1
                ",
            )
            .bind(user_id)
            .bind(module_to_i64(next))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        Ok(attempt_number)
    }

    async fn attempts_for(
        &self,
        user: UserId,
        module: ModuleNumber,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, module_number, score, total_questions, time_taken,
                   attempt_number, quiz_date
            FROM quiz_results
            WHERE user_id = ?1 AND module_number = ?2
            ORDER BY attempt_number ASC
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(module_to_i64(module))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn user_stats(&self, user: UserId) -> Result<UserStats, StorageError> {
        let user_id = user_id_to_i64(user)?;

        let row = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM progress
                  WHERE user_id = ?1 AND is_completed = 1) AS completed_modules,
                (SELECT COALESCE(AVG(score), 0.0) FROM quiz_results
                  WHERE user_id = ?1) AS average_score,
                (SELECT COALESCE(SUM(study_time), 0) FROM progress
                  WHERE user_id = ?1) AS total_study_time
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;

        map_stats_row(&row)
    }
}
