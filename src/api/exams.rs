use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::exam::orchestrator::{ExamConfig, QuestionStep};
use crate::repositories;
use crate::schemas::exam::{
    answer_to_response, history_to_response, question_to_response, summary_to_response,
    AnswerSubmitRequest, ExamFinishResponse, ExamHistoryResponse, ExamStartRequest,
    ExamStartResponse, ExamStatusResponse, NextQuestionResponse,
};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    user_id: i64,
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_exam))
        .route("/history", get(exam_history))
        .route("/:session_id", get(exam_status).delete(quit_exam))
        .route("/:session_id/answers", post(submit_answer))
        .route("/:session_id/next", post(next_question))
        .route("/:session_id/finish", post(finish_exam))
}

async fn start_exam(
    State(state): State<AppState>,
    Json(payload): Json<ExamStartRequest>,
) -> Result<(StatusCode, Json<ExamStartResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let config = ExamConfig {
        user_id: payload.user_id,
        certification: payload.certification,
        difficulty: payload.difficulty,
        topic: payload.topic,
        total_questions: payload.total_questions,
    };

    let exam = state.orchestrator().start_exam(config).await?;

    let question = exam
        .current_question
        .ok_or_else(|| ApiError::Internal("Exam started without a question".to_string()))?;
    let response = ExamStartResponse {
        session_id: exam.session.session_id.clone(),
        question: question_to_response(
            question,
            exam.session.last_question,
            exam.session.total_questions,
        ),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<AnswerSubmitRequest>,
) -> Result<Json<crate::schemas::exam::AnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let orchestrator = state.orchestrator();
    let mut exam = orchestrator.resume(&session_id).await?;
    let result = orchestrator.submit_answer(&mut exam, &payload.question_id, payload.answer).await?;

    Ok(Json(answer_to_response(result, &exam.session)))
}

async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<NextQuestionResponse>, ApiError> {
    let orchestrator = state.orchestrator();
    let mut exam = orchestrator.resume(&session_id).await?;

    let response = match orchestrator.next_question(&mut exam).await? {
        QuestionStep::Question(question) => NextQuestionResponse {
            status: "ok",
            question: Some(question_to_response(
                question,
                exam.session.last_question,
                exam.session.total_questions,
            )),
            queue_length: None,
        },
        QuestionStep::Pending { queue_length } => NextQuestionResponse {
            status: "generating",
            question: None,
            queue_length: Some(queue_length),
        },
    };

    Ok(Json(response))
}

async fn finish_exam(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamFinishResponse>, ApiError> {
    let orchestrator = state.orchestrator();
    let mut exam = orchestrator.resume(&session_id).await?;
    let summary = orchestrator.finish_exam(&mut exam).await?;

    Ok(Json(summary_to_response(summary)))
}

async fn quit_exam(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let orchestrator = state.orchestrator();
    // Interrupt any wait in flight for this session before tearing it down.
    orchestrator.cancel(&session_id);
    let mut exam = orchestrator.resume(&session_id).await?;
    orchestrator.quit_exam(&mut exam).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn exam_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ExamStatusResponse>, ApiError> {
    let orchestrator = state.orchestrator();
    let exam = orchestrator.resume(&session_id).await?;
    let generation_status = orchestrator
        .registry()
        .generation_status(&session_id)
        .await
        .map(|status| status.as_str().to_string());
    let queue_length = orchestrator.queue().len(&session_id).await;

    let session = exam.session;
    Ok(Json(ExamStatusResponse {
        session_id: session.session_id,
        user_id: session.user_id,
        certification: session.certification,
        difficulty: session.difficulty,
        topic: session.topic,
        total_questions: session.total_questions,
        score: session.score,
        last_question: session.last_question,
        answered: session.answers.len() as u32,
        generation_status,
        queue_length,
        started_at: session.started_at,
    }))
}

async fn exam_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<ExamHistoryResponse>>, ApiError> {
    let limit = params.limit.clamp(1, 100);
    let rows = repositories::exam_history::list_recent_for_user(state.db(), params.user_id, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam history"))?;

    Ok(Json(rows.into_iter().map(history_to_response).collect()))
}
