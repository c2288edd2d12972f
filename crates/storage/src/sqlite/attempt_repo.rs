use chrono::{DateTime, Utc};
use quiz_core::model::{AttemptId, UserId};
use quiz_core::{AttemptPayload, QuestionResultPayload};
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{AttemptHistory, AttemptStore, StorageError, StoredAttempt};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_from_usize(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn parse_attempt_id(id: &AttemptId) -> Result<i64, StorageError> {
    id.as_str().parse::<i64>().map_err(|_| StorageError::NotFound)
}

fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAttempt, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let saved_at: DateTime<Utc> = row.try_get("saved_at").map_err(ser)?;
    let results_json: String = row.try_get("question_results").map_err(ser)?;
    let question_results: Vec<QuestionResultPayload> =
        serde_json::from_str(&results_json).map_err(ser)?;

    Ok(StoredAttempt {
        id: AttemptId::new(id.to_string()),
        user_id: UserId::new(user_id),
        saved_at,
        payload: AttemptPayload {
            module: row.try_get("module").map_err(ser)?,
            total_questions: usize_from_i64(
                "total_questions",
                row.try_get::<i64, _>("total_questions").map_err(ser)?,
            )?,
            correct_answers: usize_from_i64(
                "correct_answers",
                row.try_get::<i64, _>("correct_answers").map_err(ser)?,
            )?,
            score_percentage: u32_from_i64(
                "score_percentage",
                row.try_get::<i64, _>("score_percentage").map_err(ser)?,
            )?,
            time_taken: u32_from_i64(
                "time_taken",
                row.try_get::<i64, _>("time_taken").map_err(ser)?,
            )?,
            question_results,
        },
    })
}

#[async_trait::async_trait]
impl AttemptStore for SqliteRepository {
    async fn save_attempt(
        &self,
        user: &UserId,
        payload: &AttemptPayload,
    ) -> Result<AttemptId, StorageError> {
        let results_json = serde_json::to_string(&payload.question_results).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    user_id, module, saved_at, total_questions, correct_answers,
                    score_percentage, time_taken, question_results
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(user.as_str())
        .bind(payload.module.as_str())
        .bind(Utc::now())
        .bind(i64_from_usize("total_questions", payload.total_questions)?)
        .bind(i64_from_usize("correct_answers", payload.correct_answers)?)
        .bind(i64::from(payload.score_percentage))
        .bind(i64::from(payload.time_taken))
        .bind(results_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = AttemptId::new(res.last_insert_rowid().to_string());
        log::debug!("stored attempt {id} for user {user}");
        Ok(id)
    }
}

#[async_trait::async_trait]
impl AttemptHistory for SqliteRepository {
    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<StoredAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, module, saved_at, total_questions, correct_answers,
                    score_percentage, time_taken, question_results
                FROM quiz_attempts
                WHERE user_id = ?1
                ORDER BY saved_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn get_attempt(&self, id: &AttemptId) -> Result<StoredAttempt, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, user_id, module, saved_at, total_questions, correct_answers,
                    score_percentage, time_taken, question_results
                FROM quiz_attempts
                WHERE id = ?1
            ",
        )
        .bind(parse_attempt_id(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }
}
