use serde::{Deserialize, Serialize};

use crate::core::cache::{answer_key, generation_status_key, queue_key, session_key, CacheStore};
use crate::exam::scoring::AnswerValue;

/// The cache-held session record: the authoritative copy of score and
/// progress while an exam is running. Configuration fields are immutable
/// for the session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamSession {
    pub(crate) session_id: String,
    pub(crate) user_id: i64,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) topic: String,
    pub(crate) total_questions: u32,
    pub(crate) score: u32,
    pub(crate) last_question: u32,
    pub(crate) answers: Vec<AnswerRecord>,
    pub(crate) started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerRecord {
    #[serde(default)]
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) user_answer: AnswerValue,
    pub(crate) correct_answer: AnswerValue,
    pub(crate) is_correct: bool,
    pub(crate) explanation: String,
}

/// Correct answer and explanation for a question already handed to the
/// client, kept under `answer:<question_id>` so a stateless caller can have
/// its submission checked after the question left the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredAnswer {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) correct_answer: AnswerValue,
    pub(crate) explanation: String,
    #[serde(default)]
    pub(crate) reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenerationStatus {
    Generating,
    Completed,
    Error,
}

impl GenerationStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Generating => "generating",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "generating" => Some(GenerationStatus::Generating),
            "completed" => Some(GenerationStatus::Completed),
            "error" => Some(GenerationStatus::Error),
            _ => None,
        }
    }
}

/// CRUD over the per-session record under `session:<id>`, TTL-bounded so
/// abandoned sessions self-expire.
#[derive(Clone)]
pub(crate) struct SessionRegistry {
    cache: CacheStore,
    ttl_seconds: u64,
}

impl SessionRegistry {
    pub(crate) fn new(cache: CacheStore, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub(crate) async fn save(&self, session: &ExamSession) -> bool {
        let payload = match serde_json::to_string(session) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, session_id = %session.session_id, "Failed to serialize session");
                return false;
            }
        };

        self.cache.set_with_ttl(&session_key(&session.session_id), &payload, self.ttl_seconds).await
    }

    pub(crate) async fn get(&self, session_id: &str) -> Option<ExamSession> {
        let payload = self.cache.get(&session_key(session_id)).await?;

        match serde_json::from_str(&payload) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::error!(error = %err, session_id, "Failed to deserialize session");
                None
            }
        }
    }

    /// Read-modify-write of the whole record. Not atomic: a concurrent
    /// writer to the same session can lose its changes, which is acceptable
    /// because each session has exactly one active consumer.
    pub(crate) async fn update<F>(&self, session_id: &str, apply: F) -> Option<ExamSession>
    where
        F: FnOnce(&mut ExamSession),
    {
        let mut session = self.get(session_id).await?;
        apply(&mut session);

        if !self.save(&session).await {
            return None;
        }

        Some(session)
    }

    /// Removes the session record and its question queue together; the two
    /// are lifecycle-coupled.
    pub(crate) async fn delete(&self, session_id: &str) -> bool {
        let session_deleted = self.cache.delete(&session_key(session_id)).await;
        let queue_deleted = self.cache.delete(&queue_key(session_id)).await;
        self.cache.delete(&generation_status_key(session_id)).await;
        session_deleted && queue_deleted
    }

    pub(crate) async fn set_generation_status(
        &self,
        session_id: &str,
        status: GenerationStatus,
    ) -> bool {
        self.cache
            .set_with_ttl(&generation_status_key(session_id), status.as_str(), self.ttl_seconds)
            .await
    }

    pub(crate) async fn generation_status(&self, session_id: &str) -> Option<GenerationStatus> {
        let raw = self.cache.get(&generation_status_key(session_id)).await?;
        GenerationStatus::parse(&raw)
    }

    pub(crate) async fn save_answer(&self, answer: &StoredAnswer) -> bool {
        let payload = match serde_json::to_string(answer) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, question_id = %answer.question_id, "Failed to serialize answer");
                return false;
            }
        };

        self.cache.set_with_ttl(&answer_key(&answer.question_id), &payload, self.ttl_seconds).await
    }

    /// Invalidate a stored answer once it has been checked.
    pub(crate) async fn delete_answer(&self, question_id: &str) -> bool {
        self.cache.delete(&answer_key(question_id)).await
    }

    pub(crate) async fn get_answer(&self, question_id: &str) -> Option<StoredAnswer> {
        let payload = self.cache.get(&answer_key(question_id)).await?;

        match serde_json::from_str(&payload) {
            Ok(answer) => Some(answer),
            Err(err) => {
                tracing::error!(error = %err, question_id, "Failed to deserialize answer");
                None
            }
        }
    }
}
