use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::core::cache::CacheStore;
use crate::core::config::ExamSettings;
use crate::core::time::{format_offset, now_utc, parse_rfc3339, to_primitive_utc};
use crate::exam::queue::{QueuedQuestion, QuestionQueue};
use crate::exam::scoring::{self, AnswerResult, AnswerValue};
use crate::exam::session::{
    AnswerRecord, ExamSession, GenerationStatus, SessionRegistry, StoredAnswer,
};
use crate::repositories::exam_history::{self, NewExamHistory};
use crate::services::generation::{GenerationRequest, GenerationTrigger};

#[derive(Debug, Error)]
pub(crate) enum ExamError {
    #[error("cache store unavailable")]
    CacheUnavailable,
    #[error("generation request could not be delivered")]
    TriggerFailed,
    #[error("generation timed out")]
    GenerationTimeout,
    #[error("operation cancelled")]
    Cancelled,
    #[error("session not found or expired")]
    SessionNotFound,
    #[error("no answer stored for question {0}")]
    UnknownQuestion(String),
    #[error("question {0} was already answered")]
    AlreadyAnswered(String),
    #[error("exam already finished")]
    AlreadyFinished,
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct ExamConfig {
    pub(crate) user_id: i64,
    pub(crate) certification: String,
    pub(crate) difficulty: String,
    pub(crate) topic: String,
    pub(crate) total_questions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Phase {
    AwaitingAnswer,
    Reviewing,
}

/// Explicit, serializable orchestrator state passed through every
/// transition. Local counters are advisory: the session registry owns
/// `score` and `last_question`, and this view is overwritten with the
/// registry's record after each mutating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamState {
    pub(crate) session: ExamSession,
    pub(crate) current_question: Option<QueuedQuestion>,
    pub(crate) phase: Phase,
    pub(crate) finished: bool,
    pub(crate) summary: Option<ExamSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamSummary {
    pub(crate) session_id: String,
    pub(crate) total_questions: u32,
    pub(crate) correct_answers: u32,
    pub(crate) incorrect_answers: u32,
    pub(crate) percentage: f64,
    pub(crate) rounded_percentage: u32,
    pub(crate) passed: bool,
    pub(crate) answers: Vec<AnswerRecord>,
    pub(crate) persisted: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum QuestionStep {
    Question(QueuedQuestion),
    /// Queue ran dry; the producer is still generating. The caller should
    /// show a "still generating" state and retry.
    Pending {
        queue_length: u64,
    },
}

enum WaitOutcome {
    Question(QueuedQuestion),
    TimedOut,
    Cancelled,
}

/// Drives one exam session from start through finish or abort: session
/// creation, bounded polling for the first question, per-question answer
/// checking, pagination through the queue, scoring, and cleanup.
#[derive(Clone)]
pub(crate) struct ExamOrchestrator {
    registry: SessionRegistry,
    queue: QuestionQueue,
    trigger: GenerationTrigger,
    db: PgPool,
    cancels: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
    first_question_timeout: Duration,
    poll_interval: Duration,
    starvation_backoff: Duration,
}

impl ExamOrchestrator {
    pub(crate) fn new(
        cache: CacheStore,
        trigger: GenerationTrigger,
        db: PgPool,
        exam: &ExamSettings,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(cache.clone(), exam.session_ttl_seconds),
            queue: QuestionQueue::new(cache, exam.session_ttl_seconds),
            trigger,
            db,
            cancels: Arc::new(Mutex::new(HashMap::new())),
            first_question_timeout: Duration::from_secs(exam.first_question_timeout_seconds),
            poll_interval: Duration::from_millis(exam.poll_interval_millis),
            starvation_backoff: Duration::from_secs(exam.starvation_backoff_seconds),
        }
    }

    fn cancel_senders(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<bool>>> {
        self.cancels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register_cancel(&self, session_id: &str) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.cancel_senders().insert(session_id.to_string(), tx);
        rx
    }

    fn release_cancel(&self, session_id: &str) {
        self.cancel_senders().remove(session_id);
    }

    /// Interrupt a wait in progress on this session, if any. Returns whether
    /// a waiter was actually signalled.
    pub(crate) fn cancel(&self, session_id: &str) -> bool {
        self.cancel_senders().get(session_id).map(|tx| tx.send(true).is_ok()).unwrap_or(false)
    }

    pub(crate) fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub(crate) fn queue(&self) -> &QuestionQueue {
        &self.queue
    }

    fn new_session_id(user_id: i64) -> String {
        let millis = now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("exam_{user_id}_{millis}")
    }

    /// `Idle -> Starting -> Active`: persists a fresh session, asks the
    /// producer to start generating, and polls for the first question on a
    /// bounded wait that [`cancel`](Self::cancel) can interrupt. On trigger
    /// failure or timeout the session is torn down and the state reverts to
    /// idle.
    pub(crate) async fn start_exam(&self, config: ExamConfig) -> Result<ExamState, ExamError> {
        let session_id = Self::new_session_id(config.user_id);

        // Defensive clear of any stale queue at this id.
        self.queue.clear(&session_id).await;

        let session = ExamSession {
            session_id: session_id.clone(),
            user_id: config.user_id,
            certification: config.certification.clone(),
            difficulty: config.difficulty.clone(),
            topic: config.topic.clone(),
            total_questions: config.total_questions,
            score: 0,
            last_question: 0,
            answers: Vec::new(),
            started_at: format_offset(now_utc()),
        };

        if !self.registry.save(&session).await {
            return Err(ExamError::CacheUnavailable);
        }
        self.registry.set_generation_status(&session_id, GenerationStatus::Generating).await;

        let request = GenerationRequest {
            session_id: session_id.clone(),
            user_id: config.user_id,
            certification: config.certification,
            difficulty: config.difficulty,
            total_questions: config.total_questions,
            topic: config.topic,
        };

        if !self.trigger.trigger_generation(&request).await.is_sent() {
            self.registry.delete(&session_id).await;
            return Err(ExamError::TriggerFailed);
        }

        metrics::counter!("exams_started_total").increment(1);

        let mut cancel = self.register_cancel(&session_id);
        let outcome =
            self.wait_for_question(&session_id, self.first_question_timeout, &mut cancel).await;
        self.release_cancel(&session_id);

        match outcome {
            WaitOutcome::Question(question) => {
                self.stash_answer(&question).await;
                let session = self
                    .registry
                    .update(&session_id, |session| session.last_question = 1)
                    .await
                    .ok_or(ExamError::SessionNotFound)?;

                tracing::info!(session_id = %session.session_id, "Exam started");
                Ok(ExamState {
                    session,
                    current_question: Some(question),
                    phase: Phase::AwaitingAnswer,
                    finished: false,
                    summary: None,
                })
            }
            WaitOutcome::TimedOut => {
                metrics::counter!("exam_generation_timeouts_total").increment(1);
                tracing::warn!(session_id, "Timed out waiting for first question");
                self.abandon(&session_id).await;
                Err(ExamError::GenerationTimeout)
            }
            WaitOutcome::Cancelled => {
                self.abandon(&session_id).await;
                Err(ExamError::Cancelled)
            }
        }
    }

    /// Reconstruct an advisory view from the registry record, for callers
    /// that lost their in-memory state between transitions.
    pub(crate) async fn resume(&self, session_id: &str) -> Result<ExamState, ExamError> {
        let session = self.registry.get(session_id).await.ok_or(ExamError::SessionNotFound)?;
        let phase = if (session.answers.len() as u32) >= session.last_question {
            Phase::Reviewing
        } else {
            Phase::AwaitingAnswer
        };

        Ok(ExamState { session, current_question: None, phase, finished: false, summary: None })
    }

    /// Checks the answer locally, applies the score through the registry's
    /// read-modify-write, and refreshes the local view from the write-back.
    pub(crate) async fn submit_answer(
        &self,
        state: &mut ExamState,
        question_id: &str,
        user_answer: AnswerValue,
    ) -> Result<AnswerResult, ExamError> {
        if state.finished {
            return Err(ExamError::AlreadyFinished);
        }
        if state.phase != Phase::AwaitingAnswer {
            return Err(ExamError::InvalidTransition("current question was already answered"));
        }
        // A replayed submission (client retry) must not score twice.
        if state.session.answers.iter().any(|record| record.question_id == question_id) {
            return Err(ExamError::AlreadyAnswered(question_id.to_string()));
        }

        let (question_text, correct_answer, explanation) = match &state.current_question {
            Some(question) if question.question_id == question_id => (
                question.question.clone(),
                question.correct_answer.clone(),
                question.explanation.clone(),
            ),
            _ => {
                let stored = self
                    .registry
                    .get_answer(question_id)
                    .await
                    .ok_or_else(|| ExamError::UnknownQuestion(question_id.to_string()))?;
                (stored.question, stored.correct_answer, stored.explanation)
            }
        };

        let result = scoring::check_answer(user_answer, correct_answer, &explanation);
        let record = AnswerRecord {
            question_id: question_id.to_string(),
            question: question_text,
            user_answer: result.user_answer.clone(),
            correct_answer: result.correct_answer.clone(),
            is_correct: result.is_correct,
            explanation: result.explanation.clone(),
        };

        let is_correct = result.is_correct;
        let session = self
            .registry
            .update(&state.session.session_id, |session| {
                if is_correct {
                    session.score += 1;
                }
                session.answers.push(record);
            })
            .await
            .ok_or(ExamError::SessionNotFound)?;

        // The stored answer has served its purpose; drop it so a replay
        // cannot be re-checked through the fallback path.
        self.registry.delete_answer(question_id).await;

        state.session = session;
        state.phase = Phase::Reviewing;

        Ok(result)
    }

    /// Pops the next question. An empty queue is starvation, not failure:
    /// one short cancellable backoff and one re-pop, then `Pending` so the
    /// caller can retry without the core spinning unbounded.
    pub(crate) async fn next_question(
        &self,
        state: &mut ExamState,
    ) -> Result<QuestionStep, ExamError> {
        if state.finished {
            return Err(ExamError::AlreadyFinished);
        }
        if state.phase != Phase::Reviewing {
            return Err(ExamError::InvalidTransition("current question has not been answered"));
        }
        if state.session.last_question >= state.session.total_questions {
            return Err(ExamError::InvalidTransition("all questions delivered; finish the exam"));
        }

        let session_id = state.session.session_id.clone();
        let mut cancel = self.register_cancel(&session_id);
        let outcome =
            self.wait_for_question(&session_id, self.starvation_backoff, &mut cancel).await;
        self.release_cancel(&session_id);

        let question = match outcome {
            WaitOutcome::Question(question) => question,
            WaitOutcome::TimedOut => {
                return Ok(QuestionStep::Pending { queue_length: self.queue.len(&session_id).await })
            }
            WaitOutcome::Cancelled => return Err(ExamError::Cancelled),
        };

        self.stash_answer(&question).await;
        let session = self
            .registry
            .update(&session_id, |session| session.last_question += 1)
            .await
            .ok_or(ExamError::SessionNotFound)?;

        state.session = session;
        state.current_question = Some(question.clone());
        state.phase = Phase::AwaitingAnswer;

        Ok(QuestionStep::Question(question))
    }

    /// Terminal transition. Idempotent: the explicit finished guard means a
    /// second call returns the same summary without touching the database,
    /// and the history insert itself is conflict-free on session id. The
    /// in-memory summary is always returned even if the durable write or
    /// the producer notification failed.
    pub(crate) async fn finish_exam(&self, state: &mut ExamState) -> Result<ExamSummary, ExamError> {
        if state.finished {
            if let Some(summary) = &state.summary {
                return Ok(summary.clone());
            }
            return Err(ExamError::AlreadyFinished);
        }
        if state.session.last_question < state.session.total_questions
            || (state.session.answers.len() as u32) < state.session.total_questions
        {
            return Err(ExamError::InvalidTransition(
                "exam is not complete; quit it to abandon the attempt",
            ));
        }

        let session = state.session.clone();
        let correct = session.score;
        let incorrect = session.total_questions.saturating_sub(correct);
        let percentage = scoring::score_percentage(correct, session.total_questions);
        let passed = scoring::is_passing(percentage);

        let completed_at = now_utc();
        let started_at = parse_rfc3339(&session.started_at).unwrap_or(completed_at);
        let duration_minutes = ((completed_at - started_at).whole_seconds().max(0) / 60) as i32;

        let persisted = match exam_history::insert(
            &self.db,
            NewExamHistory {
                session_id: &session.session_id,
                user_id: session.user_id,
                certification: &session.certification,
                difficulty: &session.difficulty,
                topic: &session.topic,
                total_questions: session.total_questions as i32,
                correct_answers: correct as i32,
                incorrect_answers: incorrect as i32,
                percentage,
                passed,
                started_at: to_primitive_utc(started_at),
                completed_at: to_primitive_utc(completed_at),
                duration_minutes,
            },
        )
        .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    session_id = %session.session_id,
                    error = %err,
                    "Failed to persist exam results; returning summary anyway"
                );
                false
            }
        };

        self.cleanup(&session.session_id).await;
        metrics::counter!("exams_finished_total").increment(1);
        tracing::info!(
            session_id = %session.session_id,
            score = correct,
            total = session.total_questions,
            passed,
            "Exam finished"
        );

        let summary = ExamSummary {
            session_id: session.session_id,
            total_questions: session.total_questions,
            correct_answers: correct,
            incorrect_answers: incorrect,
            percentage,
            rounded_percentage: scoring::rounded_percentage(correct, session.total_questions),
            passed,
            answers: session.answers,
            persisted,
        };

        state.finished = true;
        state.summary = Some(summary.clone());

        Ok(summary)
    }

    /// User-initiated abort: same cleanup path as finish minus the score
    /// persistence. Local results are discarded. Any wait in progress on
    /// the session is interrupted first.
    pub(crate) async fn quit_exam(&self, state: &mut ExamState) {
        if state.finished {
            return;
        }

        self.cancel(&state.session.session_id);
        self.cleanup(&state.session.session_id).await;
        metrics::counter!("exams_quit_total").increment(1);
        tracing::info!(session_id = %state.session.session_id, "Exam quit");

        state.finished = true;
        state.current_question = None;
    }

    /// Teardown for a session that never became active.
    async fn abandon(&self, session_id: &str) {
        self.cleanup(session_id).await;
    }

    /// Best-effort, independently fault-tolerant: a failed producer
    /// notification must not prevent local deletion, and vice versa.
    async fn cleanup(&self, session_id: &str) {
        if !self.trigger.request_stop(session_id).await.is_sent() {
            tracing::warn!(session_id, "Producer stop notification was not delivered");
        }
        if !self.registry.delete(session_id).await {
            tracing::warn!(session_id, "Failed to delete session state from cache");
        }
    }

    async fn stash_answer(&self, question: &QueuedQuestion) {
        let stored = StoredAnswer {
            question_id: question.question_id.clone(),
            question: question.question.clone(),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            reference: question.reference.clone(),
        };

        if !self.registry.save_answer(&stored).await {
            tracing::warn!(question_id = %question.question_id, "Failed to stash answer record");
        }
    }

    /// Poll-with-sleep against a monotonic deadline. The wait is
    /// cancellable: a quit flips the watch sender and the loop exits at the
    /// next scheduling point instead of sleeping out the interval.
    async fn wait_for_question(
        &self,
        session_id: &str,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> WaitOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            if *cancel.borrow() {
                return WaitOutcome::Cancelled;
            }

            if let Some(question) = self.queue.pop(session_id).await {
                return WaitOutcome::Question(question);
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }

            let nap = self.poll_interval.min(deadline - now);
            tokio::select! {
                changed = cancel.changed() => {
                    match changed {
                        Ok(()) if *cancel.borrow() => return WaitOutcome::Cancelled,
                        Ok(()) => {}
                        // Sender dropped: nobody can cancel any more.
                        Err(_) => sleep(nap).await,
                    }
                }
                _ = sleep(nap) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::scoring::AnswerValue;
    use crate::repositories::exam_history;
    use crate::test_support;
    use tokio::time::Duration;

    fn config(total_questions: u32) -> ExamConfig {
        ExamConfig {
            user_id: 7,
            certification: "AWS Solutions Architect Associate".to_string(),
            difficulty: "medium".to_string(),
            topic: "All Topics".to_string(),
            total_questions,
        }
    }

    fn single(value: &str) -> AnswerValue {
        AnswerValue::Single(value.to_string())
    }

    #[tokio::test]
    async fn start_times_out_when_producer_stays_silent() {
        let ctx = test_support::setup_exam_context().await;

        let started = std::time::Instant::now();
        let result = ctx.orchestrator.start_exam(config(3)).await;

        assert!(matches!(result, Err(ExamError::GenerationTimeout)));
        // 2s configured timeout plus polling granularity, nowhere near 30s.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn start_failure_leaves_no_session_behind() {
        let ctx = test_support::setup_exam_context_with_dead_webhook().await;

        let result = ctx.orchestrator.start_exam(config(3)).await;
        assert!(matches!(result, Err(ExamError::TriggerFailed)));
    }

    #[tokio::test]
    async fn cancel_interrupts_an_in_progress_start() {
        let ctx = test_support::setup_exam_context().await;

        let orchestrator = ctx.orchestrator.clone();
        let handle = tokio::spawn(async move { orchestrator.start_exam(config(3)).await });

        // The session id only exists once the trigger reached the producer.
        let session_id = test_support::wait_for_triggered_session(&ctx.webhook.sessions).await;
        let mut signalled = false;
        for _ in 0..50 {
            if ctx.orchestrator.cancel(&session_id) {
                signalled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(signalled, "no waiter registered for the session");

        let result = handle.await.expect("join");
        assert!(matches!(result, Err(ExamError::Cancelled)));
        assert!(ctx.orchestrator.registry().get(&session_id).await.is_none());
    }

    #[tokio::test]
    async fn three_question_exam_scores_two_thirds_and_fails() {
        let ctx = test_support::setup_exam_context().await;

        // Producer pushes the first question shortly after the trigger.
        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            queue.push(&session_id, &test_support::sample_question("q1", "A")).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            queue.push(&session_id, &test_support::sample_question("q2", "B")).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            queue.push(&session_id, &test_support::sample_question("q3", "C")).await;
        });

        let mut state = ctx.orchestrator.start_exam(config(3)).await.expect("start exam");
        let first = state.current_question.clone().expect("first question");
        assert_eq!(first.question_id, "q1");

        // Q1: correct (full label vs bare letter).
        let result = ctx
            .orchestrator
            .submit_answer(&mut state, "q1", single("A) option one"))
            .await
            .expect("submit q1");
        assert!(result.is_correct);
        assert_eq!(state.session.score, 1);

        // Q2: may need a Pending round while the producer catches up.
        let second = test_support::next_until_question(&ctx.orchestrator, &mut state).await;
        assert_eq!(second.question_id, "q2");
        let result = ctx
            .orchestrator
            .submit_answer(&mut state, "q2", single("D"))
            .await
            .expect("submit q2");
        assert!(!result.is_correct);
        assert_eq!(state.session.score, 1);

        // Q3: correct.
        let third = test_support::next_until_question(&ctx.orchestrator, &mut state).await;
        assert_eq!(third.question_id, "q3");
        let result = ctx
            .orchestrator
            .submit_answer(&mut state, "q3", single("C"))
            .await
            .expect("submit q3");
        assert!(result.is_correct);

        let summary = ctx.orchestrator.finish_exam(&mut state).await.expect("finish");
        assert_eq!(summary.correct_answers, 2);
        assert_eq!(summary.rounded_percentage, 67);
        assert!(!summary.passed);
        assert!(summary.persisted);

        // Session and queue are gone together.
        assert!(ctx.orchestrator.registry().get(&summary.session_id).await.is_none());
        assert_eq!(ctx.orchestrator.queue().len(&summary.session_id).await, 0);

        // Finishing again returns the same summary and writes no second row.
        let again = ctx.orchestrator.finish_exam(&mut state).await.expect("finish again");
        assert_eq!(again.rounded_percentage, 67);
        let rows = exam_history::count_for_session(&ctx.db, &summary.session_id)
            .await
            .expect("count rows");
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn replayed_answer_after_advancing_is_rejected() {
        let ctx = test_support::setup_exam_context().await;

        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            queue.push(&session_id, &test_support::sample_question("q1", "A")).await;
            queue.push(&session_id, &test_support::sample_question("q2", "B")).await;
        });

        let mut state = ctx.orchestrator.start_exam(config(3)).await.expect("start exam");
        let result = ctx
            .orchestrator
            .submit_answer(&mut state, "q1", single("A"))
            .await
            .expect("submit q1");
        assert!(result.is_correct);

        // The stored answer is invalidated after its first use.
        assert!(ctx.orchestrator.registry().get_answer("q1").await.is_none());

        let second = test_support::next_until_question(&ctx.orchestrator, &mut state).await;
        assert_eq!(second.question_id, "q2");

        // A client retry of the already-scored question must not score again.
        let replay = ctx.orchestrator.submit_answer(&mut state, "q1", single("A")).await;
        assert!(matches!(replay, Err(ExamError::AlreadyAnswered(_))));
        assert_eq!(state.session.score, 1);
        assert_eq!(state.session.answers.len(), 1);

        // Same outcome for a caller that lost its in-memory state.
        let mut resumed =
            ctx.orchestrator.resume(&state.session.session_id).await.expect("resume");
        let replay = ctx.orchestrator.submit_answer(&mut resumed, "q1", single("A")).await;
        assert!(matches!(replay, Err(ExamError::AlreadyAnswered(_))));
        assert_eq!(resumed.session.score, 1);

        ctx.orchestrator.quit_exam(&mut state).await;
    }

    #[tokio::test]
    async fn finishing_before_the_last_answer_is_rejected() {
        let ctx = test_support::setup_exam_context().await;

        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            queue.push(&session_id, &test_support::sample_question("q1", "A")).await;
        });

        let mut state = ctx.orchestrator.start_exam(config(2)).await.expect("start exam");
        let session_id = state.session.session_id.clone();

        // Right after start: nothing answered yet.
        let early = ctx.orchestrator.finish_exam(&mut state).await;
        assert!(matches!(early, Err(ExamError::InvalidTransition(_))));

        // One of two answered: still incomplete.
        ctx.orchestrator.submit_answer(&mut state, "q1", single("A")).await.expect("submit q1");
        let early = ctx.orchestrator.finish_exam(&mut state).await;
        assert!(matches!(early, Err(ExamError::InvalidTransition(_))));

        let rows =
            exam_history::count_for_session(&ctx.db, &session_id).await.expect("count rows");
        assert_eq!(rows, 0);

        ctx.orchestrator.quit_exam(&mut state).await;
    }

    #[tokio::test]
    async fn quitting_mid_exam_persists_no_history_row() {
        let ctx = test_support::setup_exam_context().await;

        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            for n in 1..=5 {
                queue
                    .push(&session_id, &test_support::sample_question(&format!("q{n}"), "A"))
                    .await;
            }
        });

        let mut state = ctx.orchestrator.start_exam(config(5)).await.expect("start exam");
        ctx.orchestrator
            .submit_answer(&mut state, "q1", single("A"))
            .await
            .expect("submit q1");

        let session_id = state.session.session_id.clone();
        ctx.orchestrator.quit_exam(&mut state).await;

        assert!(ctx.orchestrator.registry().get(&session_id).await.is_none());
        assert_eq!(ctx.orchestrator.queue().len(&session_id).await, 0);

        let rows =
            exam_history::count_for_session(&ctx.db, &session_id).await.expect("count rows");
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn resume_reflects_registry_truth() {
        let ctx = test_support::setup_exam_context().await;

        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            queue.push(&session_id, &test_support::sample_question("q1", "B")).await;
        });

        let mut state = ctx.orchestrator.start_exam(config(2)).await.expect("start exam");
        ctx.orchestrator
            .submit_answer(&mut state, "q1", single("B"))
            .await
            .expect("submit q1");

        let resumed =
            ctx.orchestrator.resume(&state.session.session_id).await.expect("resume");
        assert_eq!(resumed.session.score, 1);
        assert_eq!(resumed.session.last_question, 1);
        assert_eq!(resumed.phase, Phase::Reviewing);

        ctx.orchestrator.quit_exam(&mut state).await;
    }

    #[tokio::test]
    async fn submitting_twice_for_one_question_is_rejected() {
        let ctx = test_support::setup_exam_context().await;

        let queue = ctx.orchestrator.queue().clone();
        let webhook_sessions = ctx.webhook.sessions.clone();
        tokio::spawn(async move {
            let session_id = test_support::wait_for_triggered_session(&webhook_sessions).await;
            queue.push(&session_id, &test_support::sample_question("q1", "A")).await;
        });

        let mut state = ctx.orchestrator.start_exam(config(2)).await.expect("start exam");
        ctx.orchestrator.submit_answer(&mut state, "q1", single("A")).await.expect("first");

        let second = ctx.orchestrator.submit_answer(&mut state, "q1", single("B")).await;
        assert!(matches!(second, Err(ExamError::InvalidTransition(_))));
        assert_eq!(state.session.score, 1);

        ctx.orchestrator.quit_exam(&mut state).await;
    }
}
