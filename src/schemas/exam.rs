use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::ExamHistory;
use crate::exam::orchestrator::ExamSummary;
use crate::exam::queue::{QueuedQuestion, QuestionType};
use crate::exam::scoring::{AnswerResult, AnswerValue};
use crate::exam::session::{AnswerRecord, ExamSession};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamStartRequest {
    pub(crate) user_id: i64,
    #[validate(length(min = 1, message = "certification must not be empty"))]
    pub(crate) certification: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: String,
    #[serde(default = "default_topic")]
    pub(crate) topic: String,
    #[serde(default = "default_total_questions")]
    #[serde(alias = "totalQuestions")]
    #[validate(range(min = 1, max = 50, message = "total_questions must be between 1 and 50"))]
    pub(crate) total_questions: u32,
}

/// Client-facing question view. The correct answer and explanation are
/// withheld until the answer is submitted.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) number: u32,
    pub(crate) total_questions: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamStartResponse {
    pub(crate) session_id: String,
    pub(crate) question: QuestionResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSubmitRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    pub(crate) answer: AnswerValue,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) is_correct: bool,
    pub(crate) user_answer: AnswerValue,
    pub(crate) correct_answer: AnswerValue,
    pub(crate) explanation: String,
    pub(crate) score: u32,
    pub(crate) answered: u32,
    pub(crate) total_questions: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct NextQuestionResponse {
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) question: Option<QuestionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) queue_length: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerReview {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) user_answer: AnswerValue,
    pub(crate) correct_answer: AnswerValue,
    pub(crate) is_correct: bool,
    pub(crate) explanation: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamFinishResponse {
    pub(crate) session_id: String,
    pub(crate) total_questions: u32,
    pub(crate) correct_answers: u32,
    pub(crate) incorrect_answers: u32,
    pub(crate) percentage: f64,
    pub(crate) rounded_percentage: u32,
    pub(crate) passed: bool,
    pub(crate) persisted: bool,
    pub(crate) answers: Vec<AnswerReview>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamStatusResponse {
    pub(crate) session_id: String,
    pub(crate) user_id: i64,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) topic: String,
    pub(crate) total_questions: u32,
    pub(crate) score: u32,
    pub(crate) last_question: u32,
    pub(crate) answered: u32,
    pub(crate) generation_status: Option<String>,
    pub(crate) queue_length: u64,
    pub(crate) started_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamHistoryResponse {
    pub(crate) session_id: String,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) topic: String,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) incorrect_answers: i32,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) started_at: String,
    pub(crate) completed_at: String,
    pub(crate) duration_minutes: i32,
}

pub(crate) fn question_to_response(
    question: QueuedQuestion,
    number: u32,
    total_questions: u32,
) -> QuestionResponse {
    QuestionResponse {
        question_id: question.question_id,
        question: question.question,
        options: question.options,
        question_type: question.question_type,
        number,
        total_questions,
    }
}

pub(crate) fn answer_to_response(result: AnswerResult, session: &ExamSession) -> AnswerResponse {
    AnswerResponse {
        is_correct: result.is_correct,
        user_answer: result.user_answer,
        correct_answer: result.correct_answer,
        explanation: result.explanation,
        score: session.score,
        answered: session.answers.len() as u32,
        total_questions: session.total_questions,
    }
}

pub(crate) fn summary_to_response(summary: ExamSummary) -> ExamFinishResponse {
    ExamFinishResponse {
        session_id: summary.session_id,
        total_questions: summary.total_questions,
        correct_answers: summary.correct_answers,
        incorrect_answers: summary.incorrect_answers,
        percentage: summary.percentage,
        rounded_percentage: summary.rounded_percentage,
        passed: summary.passed,
        persisted: summary.persisted,
        answers: summary.answers.into_iter().map(record_to_review).collect(),
    }
}

pub(crate) fn history_to_response(row: ExamHistory) -> ExamHistoryResponse {
    ExamHistoryResponse {
        session_id: row.session_id,
        certification: row.certification,
        difficulty: row.difficulty,
        topic: row.topic,
        total_questions: row.total_questions,
        correct_answers: row.correct_answers,
        incorrect_answers: row.incorrect_answers,
        percentage: row.percentage,
        passed: row.passed,
        started_at: format_primitive(row.started_at),
        completed_at: format_primitive(row.completed_at),
        duration_minutes: row.duration_minutes,
    }
}

fn record_to_review(record: AnswerRecord) -> AnswerReview {
    AnswerReview {
        question_id: record.question_id,
        question: record.question,
        user_answer: record.user_answer,
        correct_answer: record.correct_answer,
        is_correct: record.is_correct,
        explanation: record.explanation,
    }
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_topic() -> String {
    "All Topics".to_string()
}

fn default_total_questions() -> u32 {
    10
}
