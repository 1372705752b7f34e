use drill_core::model::{
    ModuleEntry, ModuleNumber, ModuleProgress, QuizAttempt, UserId, UserStats,
};
use sqlx::Row;

use crate::repository::{StorageError, UnlockedModule, UserRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps a sqlx write failure, turning uniqueness violations into
/// `StorageError::Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn module_from_i64(v: i64) -> Result<ModuleNumber, StorageError> {
    Ok(ModuleNumber::new(i64_to_u32("module_number", v)?))
}

pub(crate) fn module_to_i64(module: ModuleNumber) -> i64 {
    i64::from(module.value())
}

pub(crate) fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        username: row.try_get("username").map_err(ser)?,
        password_hash: row.try_get("password_hash").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        last_login: row.try_get("last_login").map_err(ser)?,
    })
}

pub(crate) fn map_module_row(row: &sqlx::sqlite::SqliteRow) -> Result<ModuleEntry, StorageError> {
    ModuleEntry::new(
        module_from_i64(row.try_get::<i64, _>("module_number").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("content_reference").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_unlocked_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<UnlockedModule, StorageError> {
    Ok(UnlockedModule {
        module_number: module_from_i64(row.try_get::<i64, _>("module_number").map_err(ser)?)?,
        completed: row.try_get::<bool, _>("is_completed").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ModuleProgress, StorageError> {
    ModuleProgress::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        module_from_i64(row.try_get::<i64, _>("module_number").map_err(ser)?)?,
        row.try_get::<bool, _>("is_unlocked").map_err(ser)?,
        row.try_get::<bool, _>("is_completed").map_err(ser)?,
        row.try_get("completion_date").map_err(ser)?,
        i64_to_u64(
            "study_time",
            row.try_get::<i64, _>("study_time").map_err(ser)?,
        )?,
        i64_to_u32("attempts", row.try_get::<i64, _>("attempts").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizAttempt, StorageError> {
    QuizAttempt::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        module_from_i64(row.try_get::<i64, _>("module_number").map_err(ser)?)?,
        i64_to_u32("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        i64_to_u32(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        i64_to_u64(
            "time_taken",
            row.try_get::<i64, _>("time_taken").map_err(ser)?,
        )?,
        i64_to_u32(
            "attempt_number",
            row.try_get::<i64, _>("attempt_number").map_err(ser)?,
        )?,
        row.try_get("quiz_date").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_stats_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserStats, StorageError> {
    Ok(UserStats {
        completed_modules: i64_to_u32(
            "completed_modules",
            row.try_get::<i64, _>("completed_modules").map_err(ser)?,
        )?,
        average_score: row.try_get::<f64, _>("average_score").map_err(ser)?,
        total_study_time_secs: i64_to_u64(
            "total_study_time",
            row.try_get::<i64, _>("total_study_time").map_err(ser)?,
        )?,
    })
}
