use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::core::config::Settings;
use crate::core::time::{format_offset, now_utc};

/// Outcome of a one-way control message. `Sent` means "request accepted for
/// delivery", not "the producer started working"; callers must not let
/// `Failed` gate local state transitions during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub(crate) fn is_sent(self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationRequest {
    pub(crate) session_id: String,
    pub(crate) user_id: i64,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) total_questions: u32,
    pub(crate) topic: String,
}

/// Fire-and-forget client for the external question-generation workflow.
/// The producer's only observable effect on this service is appending
/// questions to `exam_queue:<session_id>` in the shared cache.
#[derive(Debug, Clone)]
pub(crate) struct GenerationTrigger {
    client: Client,
    webhook_url: Option<String>,
}

impl GenerationTrigger {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.webhook().trigger_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, webhook_url: settings.webhook().exam_webhook_url.clone() })
    }

    pub(crate) async fn trigger_generation(&self, request: &GenerationRequest) -> DeliveryStatus {
        let payload = json!({
            "action": "generate_questions",
            "session_id": request.session_id,
            "user_id": request.user_id,
            "certification": request.certification,
            "difficulty": request.difficulty,
            "total_questions": request.total_questions,
            "topic": request.topic,
            "timestamp": format_offset(now_utc()),
        });

        self.post(&request.session_id, payload).await
    }

    pub(crate) async fn request_stop(&self, session_id: &str) -> DeliveryStatus {
        let payload = json!({
            "action": "quit_session",
            "session_id": session_id,
            "timestamp": format_offset(now_utc()),
        });

        self.post(session_id, payload).await
    }

    async fn post(&self, session_id: &str, payload: serde_json::Value) -> DeliveryStatus {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::warn!(session_id, "Exam webhook not configured; dropping control message");
            return DeliveryStatus::Failed;
        };

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => DeliveryStatus::Sent,
            Ok(response) => {
                tracing::error!(
                    session_id,
                    status = %response.status(),
                    "Exam webhook rejected control message"
                );
                DeliveryStatus::Failed
            }
            Err(err) => {
                tracing::error!(session_id, error = %err, "Exam webhook call failed");
                DeliveryStatus::Failed
            }
        }
    }
}
