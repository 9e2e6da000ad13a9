use serde::{Deserialize, Serialize};

use crate::core::cache::{queue_key, CacheStore};
use crate::exam::scoring::AnswerValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum QuestionType {
    #[default]
    Single,
    Multiple,
}

/// A question produced externally and parked in the per-session queue until
/// the client consumes it. Consumed exactly once, in FIFO order; a popped
/// question is never requeued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QueuedQuestion {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    #[serde(rename = "type", default)]
    pub(crate) question_type: QuestionType,
    pub(crate) correct_answer: AnswerValue,
    #[serde(default)]
    pub(crate) explanation: String,
    #[serde(default)]
    pub(crate) reference: Option<String>,
}

/// FIFO hand-off between the external producer and the one active consumer
/// per session. The queue performs no reordering, deduplication, or
/// validation of question content.
#[derive(Clone)]
pub(crate) struct QuestionQueue {
    cache: CacheStore,
    ttl_seconds: u64,
}

impl QuestionQueue {
    pub(crate) fn new(cache: CacheStore, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub(crate) async fn push(&self, session_id: &str, question: &QueuedQuestion) -> bool {
        let payload = match serde_json::to_string(question) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, session_id, "Failed to serialize question");
                return false;
            }
        };

        self.cache.list_push(&queue_key(session_id), &payload, self.ttl_seconds).await
    }

    /// `None` means "not ready yet", not an error; the caller is expected
    /// to retry.
    pub(crate) async fn pop(&self, session_id: &str) -> Option<QueuedQuestion> {
        let payload = self.cache.list_pop(&queue_key(session_id)).await?;

        match serde_json::from_str(&payload) {
            Ok(question) => Some(question),
            Err(err) => {
                tracing::error!(error = %err, session_id, "Failed to deserialize queued question");
                None
            }
        }
    }

    /// Display-only; never used for control flow.
    pub(crate) async fn len(&self, session_id: &str) -> u64 {
        self.cache.list_len(&queue_key(session_id)).await
    }

    pub(crate) async fn clear(&self, session_id: &str) -> bool {
        self.cache.delete(&queue_key(session_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use uuid::Uuid;

    #[tokio::test]
    async fn pop_returns_questions_in_push_order() {
        let _guard = test_support::env_lock().await;
        let cache = test_support::connected_cache().await;
        let queue = QuestionQueue::new(cache, 60);
        let session_id = Uuid::new_v4().to_string();

        for n in 1..=3 {
            let question = test_support::sample_question(&format!("q{n}"), "B");
            assert!(queue.push(&session_id, &question).await);
        }

        assert_eq!(queue.len(&session_id).await, 3);
        for n in 1..=3 {
            let popped = queue.pop(&session_id).await.expect("question");
            assert_eq!(popped.question_id, format!("q{n}"));
        }
        assert_eq!(queue.len(&session_id).await, 0);
    }

    #[tokio::test]
    async fn popped_question_is_never_returned_again() {
        let _guard = test_support::env_lock().await;
        let cache = test_support::connected_cache().await;
        let queue = QuestionQueue::new(cache, 60);
        let session_id = Uuid::new_v4().to_string();

        queue.push(&session_id, &test_support::sample_question("only", "A")).await;

        assert!(queue.pop(&session_id).await.is_some());
        assert!(queue.pop(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let _guard = test_support::env_lock().await;
        let cache = test_support::connected_cache().await;
        let queue = QuestionQueue::new(cache, 60);
        let session_id = Uuid::new_v4().to_string();

        queue.push(&session_id, &test_support::sample_question("q1", "A")).await;
        assert!(queue.clear(&session_id).await);
        assert_eq!(queue.len(&session_id).await, 0);
        // Clearing an already-empty queue still succeeds.
        assert!(queue.clear(&session_id).await);
    }

    #[test]
    fn queued_question_defaults_type_to_single() {
        let raw = r#"{
            "question_id": "q1",
            "question": "Which service stores objects?",
            "options": ["A) Amazon S3", "B) Amazon EC2"],
            "correct_answer": "A"
        }"#;
        let question: QueuedQuestion = serde_json::from_str(raw).expect("parse");
        assert_eq!(question.question_type, QuestionType::Single);
        assert_eq!(question.explanation, "");
        assert!(question.reference.is_none());
    }
}
