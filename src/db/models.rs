use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

/// One append-only audit row per finished exam.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamHistory {
    pub(crate) session_id: String,
    pub(crate) user_id: i64,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) topic: String,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) incorrect_answers: i32,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
}
