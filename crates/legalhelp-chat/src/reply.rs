//! Deferred bot replies.
//!
//! Every accepted user message gets one cancellable scheduled task. When its
//! latency elapses the task posts a `ReplyReady` to the widget's event channel;
//! the widget then claims it with `complete`. A ticket that was cancelled in
//! the meantime cannot be claimed, so a reply whose timer fired just before a
//! clear is still dropped.
//!
//! Timers run on the tokio runtime that was current when the pipeline was
//! built, or the caller's runtime otherwise. With neither, scheduling is
//! refused rather than panicking.
//!
//! Tasks complete in timer order. Two rapid sends with different latencies
//! may have their replies appended out of submission order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use legalhelp_core::types::{LanguageCode, Message};

use crate::error::ChatError;

/// Produces the text of a bot reply.
pub trait ReplyGenerator: Send + Sync {
    /// Reply text for `submitted`, in the language active at submission time.
    fn generate(&self, submitted: &str, language: LanguageCode) -> String;

    /// Delay before the reply is delivered. Defaults to the pipeline latency.
    fn latency(&self, _submitted: &str, default: Duration) -> Duration {
        default
    }
}

/// Echoes the question back; stands in for a real answering backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderReplyGenerator;

impl ReplyGenerator for PlaceholderReplyGenerator {
    fn generate(&self, submitted: &str, language: LanguageCode) -> String {
        format!("Response to \"{}\" in {}", submitted, language.label())
    }
}

/// A reply whose latency has elapsed, waiting to be claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyReady {
    pub ticket: Uuid,
    /// Id of the user message being answered.
    pub in_reply_to: String,
    pub text: String,
}

type PendingReplies = Arc<Mutex<HashMap<Uuid, AbortHandle>>>;

/// Handle to one scheduled reply.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    ticket: Uuid,
    pending: PendingReplies,
}

impl ReplyHandle {
    pub fn ticket(&self) -> Uuid {
        self.ticket
    }

    /// Whether the reply is still waiting to be delivered or claimed.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.contains_key(&self.ticket))
            .unwrap_or(false)
    }

    /// Cancel this reply. Returns `false` if it was already delivered or
    /// cancelled.
    pub fn cancel(&self) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.remove(&self.ticket) {
            Some(task) => {
                task.abort();
                debug!(ticket = %self.ticket, "Reply cancelled");
                true
            }
            None => false,
        }
    }
}

/// Schedules and tracks deferred replies.
pub struct ReplyPipeline {
    latency: Duration,
    generator: Arc<dyn ReplyGenerator>,
    pending: PendingReplies,
    tx: mpsc::UnboundedSender<ReplyReady>,
    runtime: Option<Handle>,
}

impl ReplyPipeline {
    pub fn new(
        latency: Duration,
        generator: Arc<dyn ReplyGenerator>,
        tx: mpsc::UnboundedSender<ReplyReady>,
    ) -> Self {
        Self {
            latency,
            generator,
            pending: Arc::new(Mutex::new(HashMap::new())),
            tx,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    /// Whether a runtime is available to run reply timers.
    pub fn can_schedule(&self) -> bool {
        self.runtime().is_some()
    }

    /// Schedule the reply to `message`.
    pub fn schedule(
        &self,
        message: &Message,
        language: LanguageCode,
    ) -> Result<ReplyHandle, ChatError> {
        let delay = self.generator.latency(&message.text, self.latency);
        self.schedule_after(message, language, delay)
    }

    /// Schedule the reply to `message` with an explicit delay.
    pub fn schedule_after(
        &self,
        message: &Message,
        language: LanguageCode,
        delay: Duration,
    ) -> Result<ReplyHandle, ChatError> {
        let Some(runtime) = self.runtime() else {
            tracing::warn!(in_reply_to = %message.id, "No tokio runtime, reply not scheduled");
            return Err(ChatError::RuntimeUnavailable);
        };

        let ticket = Uuid::new_v4();
        let ready = ReplyReady {
            ticket,
            in_reply_to: message.id.clone(),
            text: self.generator.generate(&message.text, language),
        };

        let tx = self.tx.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ready);
        });

        match self.pending.lock() {
            Ok(mut pending) => {
                pending.insert(ticket, task.abort_handle());
            }
            Err(e) => {
                // Untracked replies could never be claimed.
                tracing::error!("Reply table lock poisoned: {}", e);
                task.abort();
            }
        }

        debug!(
            ticket = %ticket,
            in_reply_to = %message.id,
            delay_ms = delay.as_millis() as u64,
            "Reply scheduled"
        );
        Ok(ReplyHandle {
            ticket,
            pending: Arc::clone(&self.pending),
        })
    }

    /// Claim a delivered reply. Returns `None` when its ticket was cancelled
    /// after the timer fired, in which case the reply must be discarded.
    pub fn complete(&self, ready: ReplyReady) -> Option<ReplyReady> {
        let claimed = self
            .pending
            .lock()
            .map(|mut p| p.remove(&ready.ticket).is_some())
            .unwrap_or(false);
        if claimed {
            Some(ready)
        } else {
            debug!(ticket = %ready.ticket, "Dropping reply for cancelled ticket");
            None
        }
    }

    /// Cancel every reply not yet claimed. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let Ok(mut pending) = self.pending.lock() else {
            return 0;
        };
        let count = pending.len();
        for (_, task) in pending.drain() {
            task.abort();
        }
        if count > 0 {
            debug!(count, "Pending replies cancelled");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Drop for ReplyPipeline {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for ReplyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyPipeline")
            .field("latency", &self.latency)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use legalhelp_core::types::Timestamp;

    fn pipeline(latency_ms: u64) -> (ReplyPipeline, mpsc::UnboundedReceiver<ReplyReady>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = ReplyPipeline::new(
            Duration::from_millis(latency_ms),
            Arc::new(PlaceholderReplyGenerator),
            tx,
        );
        (pipeline, rx)
    }

    #[test]
    fn test_placeholder_reply_text() {
        let text = PlaceholderReplyGenerator.generate("Can I get bail?", LanguageCode::Hi);
        assert_eq!(text, "Response to \"Can I get bail?\" in हिंदी");
    }

    #[test]
    fn test_schedule_without_runtime_is_refused() {
        let (pipeline, mut rx) = pipeline(10);
        assert!(!pipeline.can_schedule());
        let result = pipeline.schedule(&Message::user("hello", Timestamp(1)), LanguageCode::En);
        assert!(matches!(result, Err(ChatError::RuntimeUnavailable)));
        assert_eq!(pipeline.pending_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pipeline_keeps_runtime_it_was_built_in() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let (pipeline, mut rx) = runtime.block_on(async { pipeline(10) });

        // Scheduled from outside the runtime, driven by it afterwards.
        assert!(pipeline.can_schedule());
        let handle = pipeline
            .schedule(&Message::user("hello", Timestamp(1)), LanguageCode::En)
            .unwrap();
        let ready = runtime.block_on(rx.recv()).unwrap();
        assert_eq!(ready.ticket, handle.ticket());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_delivered_after_latency() {
        let (pipeline, mut rx) = pipeline(1500);
        let msg = Message::user("Can I get bail?", Timestamp(1));
        let handle = pipeline.schedule(&msg, LanguageCode::En).unwrap();
        assert!(handle.is_pending());

        tokio::time::advance(Duration::from_millis(1499)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        let ready = rx.recv().await.unwrap();
        assert_eq!(ready.ticket, handle.ticket());
        assert_eq!(ready.in_reply_to, msg.id);
        assert_eq!(ready.text, "Response to \"Can I get bail?\" in English");

        let claimed = pipeline.complete(ready).unwrap();
        assert_eq!(claimed.ticket, handle.ticket());
        assert!(!handle.is_pending());
        assert_eq!(pipeline.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_latency_suppresses_reply() {
        let (pipeline, mut rx) = pipeline(1500);
        let handle = pipeline
            .schedule(&Message::user("hello", Timestamp(1)), LanguageCode::En)
            .unwrap();

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(handle.cancel());
        assert!(!handle.cancel());

        tokio::time::advance(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_fired_before_cancel_cannot_be_claimed() {
        let (pipeline, mut rx) = pipeline(100);
        pipeline
            .schedule(&Message::user("hello", Timestamp(1)), LanguageCode::Ta)
            .unwrap();

        let ready = rx.recv().await.unwrap();
        assert_eq!(pipeline.cancel_all(), 1);
        assert!(pipeline.complete(ready).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_counts_pending() {
        let (pipeline, mut rx) = pipeline(1000);
        for i in 0..3 {
            pipeline
                .schedule(&Message::user(format!("q{i}"), Timestamp(i)), LanguageCode::En)
                .unwrap();
        }
        assert_eq!(pipeline.pending_count(), 3);
        assert_eq!(pipeline.cancel_all(), 3);
        assert_eq!(pipeline.cancel_all(), 0);

        tokio::time::advance(Duration::from_millis(2000)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_complete_in_timer_order() {
        let (pipeline, mut rx) = pipeline(1500);
        let slow = Message::user("slow", Timestamp(1));
        let fast = Message::user("fast", Timestamp(2));
        pipeline
            .schedule_after(&slow, LanguageCode::En, Duration::from_millis(3000))
            .unwrap();
        pipeline
            .schedule_after(&fast, LanguageCode::En, Duration::from_millis(500))
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.in_reply_to, fast.id);
        assert_eq!(second.in_reply_to, slow.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_language_is_captured_at_schedule_time() {
        struct Slow;
        impl ReplyGenerator for Slow {
            fn generate(&self, submitted: &str, language: LanguageCode) -> String {
                format!("{submitted}:{}", language.code())
            }
            fn latency(&self, _submitted: &str, _default: Duration) -> Duration {
                Duration::from_millis(10)
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline = ReplyPipeline::new(Duration::from_secs(60), Arc::new(Slow), tx);
        pipeline
            .schedule(&Message::user("q", Timestamp(1)), LanguageCode::Gu)
            .unwrap();

        let ready = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("generator latency overrides the default")
            .unwrap();
        assert_eq!(ready.text, "q:gu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let (pipeline, mut rx) = pipeline(100);
        pipeline
            .schedule(&Message::user("q", Timestamp(1)), LanguageCode::En)
            .unwrap();
        drop(pipeline);

        tokio::time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
