use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use lounge_core::domain::user::UserId;

use crate::delivery::{MessageSink, Outbound};

type PendingTasks = HashMap<UserId, HashMap<u64, AbortHandle>>;

/// Delayed one-shot messages, owned per user so they can be cancelled when
/// the session is reset or the process shuts down.
#[derive(Clone)]
pub struct FollowUpScheduler {
    sink: Arc<dyn MessageSink>,
    pending: Arc<Mutex<PendingTasks>>,
    next_id: Arc<AtomicU64>,
}

fn lock(pending: &Mutex<PendingTasks>) -> MutexGuard<'_, PendingTasks> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl FollowUpScheduler {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink, pending: Arc::default(), next_id: Arc::new(AtomicU64::new(1)) }
    }

    pub fn schedule(&self, user_id: UserId, chat_id: i64, delay: Duration, text: impl Into<String>) {
        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let outbound = Outbound::text(chat_id, text);
        let sink = Arc::clone(&self.sink);
        let pending = Arc::clone(&self.pending);

        // Registered under the same guard the task uses to deregister itself.
        let mut tasks = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match sink.deliver(&outbound).await {
                Ok(()) => debug!(
                    event_name = "dialog.followup.delivered",
                    user_id = %user_id,
                    "follow-up delivered"
                ),
                Err(error) => warn!(
                    event_name = "dialog.followup.failed",
                    user_id = %user_id,
                    error = %error,
                    "follow-up delivery failed"
                ),
            }
            let mut tasks = lock(&pending);
            if let Some(user_tasks) = tasks.get_mut(&user_id) {
                user_tasks.remove(&task_id);
                if user_tasks.is_empty() {
                    tasks.remove(&user_id);
                }
            }
        });
        tasks.entry(user_id).or_default().insert(task_id, handle.abort_handle());
    }

    /// Aborts every pending follow-up for one user. Returns how many were cancelled.
    pub fn cancel_for(&self, user_id: UserId) -> usize {
        let removed = lock(&self.pending).remove(&user_id).unwrap_or_default();
        for handle in removed.values() {
            handle.abort();
        }
        if !removed.is_empty() {
            debug!(
                event_name = "dialog.followup.cancelled",
                user_id = %user_id,
                cancelled = removed.len(),
                "pending follow-ups cancelled"
            );
        }
        removed.len()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).values().map(HashMap::len).sum()
    }

    pub fn shutdown(&self) {
        let drained: Vec<AbortHandle> =
            lock(&self.pending).drain().flat_map(|(_, tasks)| tasks.into_values()).collect();
        for handle in &drained {
            handle.abort();
        }
        info!(
            event_name = "dialog.followup.shutdown",
            aborted = drained.len(),
            "follow-up scheduler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lounge_core::domain::user::UserId;

    use super::FollowUpScheduler;
    use crate::delivery::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn delivers_after_the_delay() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = FollowUpScheduler::new(sink.clone());

        scheduler.schedule(UserId(1), 10, Duration::from_secs(60), "☕ Ваша кава вже в дорозі!");
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(sink.delivered().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(sink.sent_to(10), vec!["☕ Ваша кава вже в дорозі!".to_owned()]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_for_only_touches_one_user() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = FollowUpScheduler::new(sink.clone());

        scheduler.schedule(UserId(1), 10, Duration::from_secs(5), "one");
        scheduler.schedule(UserId(2), 20, Duration::from_secs(5), "two");

        assert_eq!(scheduler.cancel_for(UserId(1)), 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        assert!(sink.sent_to(10).is_empty());
        assert_eq!(sink.sent_to(20), vec!["two".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_everything() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = FollowUpScheduler::new(sink.clone());
        scheduler.schedule(UserId(1), 10, Duration::from_secs(5), "one");
        scheduler.schedule(UserId(1), 10, Duration::from_secs(9), "two");

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(scheduler.pending_count(), 0);
        assert!(sink.delivered().is_empty());
    }
}
