use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamHistory;

pub(crate) const COLUMNS: &str = "\
    session_id, user_id, certification, difficulty, topic, total_questions, \
    correct_answers, incorrect_answers, percentage, passed, started_at, \
    completed_at, duration_minutes";

#[derive(Debug, Clone)]
pub(crate) struct NewExamHistory<'a> {
    pub(crate) session_id: &'a str,
    pub(crate) user_id: i64,
    pub(crate) certification: &'a str,
    pub(crate) difficulty: &'a str,
    pub(crate) topic: &'a str,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) incorrect_answers: i32,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
}

/// Append-only; `ON CONFLICT DO NOTHING` keeps a racing double-finish from
/// writing a second row for the same session.
pub(crate) async fn insert(pool: &PgPool, row: NewExamHistory<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_sessions (
            session_id, user_id, certification, difficulty, topic, total_questions,
            correct_answers, incorrect_answers, percentage, passed, started_at,
            completed_at, duration_minutes
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(row.session_id)
    .bind(row.user_id)
    .bind(row.certification)
    .bind(row.difficulty)
    .bind(row.topic)
    .bind(row.total_questions)
    .bind(row.correct_answers)
    .bind(row.incorrect_answers)
    .bind(row.percentage)
    .bind(row.passed)
    .bind(row.started_at)
    .bind(row.completed_at)
    .bind(row.duration_minutes)
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn list_recent_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<ExamHistory>, sqlx::Error> {
    sqlx::query_as::<_, ExamHistory>(&format!(
        "SELECT {COLUMNS}
         FROM exam_sessions
         WHERE user_id = $1
         ORDER BY completed_at DESC
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
pub(crate) async fn count_for_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_sessions WHERE session_id = $1")
        .bind(session_id)
        .fetch_one(pool)
        .await
}
