use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::exam::orchestrator::ExamError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    GatewayTimeout(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<ExamError> for ApiError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::SessionNotFound => {
                ApiError::NotFound("Exam session not found or expired".to_string())
            }
            ExamError::UnknownQuestion(question_id) => {
                ApiError::NotFound(format!("No answer on record for question {question_id}"))
            }
            ExamError::AlreadyAnswered(question_id) => {
                ApiError::Conflict(format!("Question {question_id} was already answered"))
            }
            ExamError::AlreadyFinished => {
                ApiError::Conflict("Exam session is already finished".to_string())
            }
            ExamError::InvalidTransition(message) => ApiError::Conflict(message.to_string()),
            ExamError::GenerationTimeout => {
                ApiError::GatewayTimeout("Question generation timed out".to_string())
            }
            ExamError::TriggerFailed => {
                ApiError::ServiceUnavailable("Question generation service unavailable".to_string())
            }
            ExamError::CacheUnavailable => {
                ApiError::ServiceUnavailable("Cache store unavailable".to_string())
            }
            ExamError::Cancelled => ApiError::Conflict("Exam session was cancelled".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::GatewayTimeout(message) => {
                let status = StatusCode::GATEWAY_TIMEOUT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                let status = StatusCode::SERVICE_UNAVAILABLE;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}
