//! Periodic detection loop with explicit cancellation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A tick callback run every `period` until cancelled or until it returns `false`.
///
/// Dropping the task cancels it. The loop holds a child of the caller's token,
/// so cancelling the parent stops the task but dropping the task leaves the
/// parent untouched.
pub struct ScheduledTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        cancel: CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancel = cancel.child_token();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            log::debug!("{} loop started ({:?} period)", name, period);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !tick() {
                            break;
                        }
                    }
                }
            }
            log::debug!("{} loop stopped", name);
        });

        Self { name, cancel, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the loop to exit. No tick runs after this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for the loop to end on its own.
    pub async fn join(mut self) {
        if let Err(e) = (&mut self.handle).await {
            log::warn!("{} loop ended abnormally: {}", self.name, e);
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let period = Duration::from_millis(5);
        let task = ScheduledTask::spawn("test", period, CancellationToken::new(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        task.stop().await;
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "only {} ticks", after_stop);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_tick_can_end_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let period = Duration::from_millis(1);
        let task = ScheduledTask::spawn("test", period, CancellationToken::new(), move || {
            c.fetch_add(1, Ordering::SeqCst) < 2
        });
        task.join().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_external_cancel() {
        let token = CancellationToken::new();
        let task = ScheduledTask::spawn("test", Duration::from_millis(1), token.clone(), || true);
        token.cancel();
        assert!(task.is_cancelled());
        task.join().await;
    }

    #[tokio::test]
    async fn test_drop_cancels_loop() {
        let token = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task = ScheduledTask::spawn("test", Duration::from_millis(2), token.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(task);
        // Let the loop observe the cancellation
        tokio::time::sleep(Duration::from_millis(5)).await;
        let after_drop = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
        // Only this task's child token was cancelled
        assert!(!token.is_cancelled());
    }
}
