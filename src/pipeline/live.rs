//! A capture session driven by a scheduled loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::devices::CaptureDevice;
use super::scheduler::ScheduledTask;
use super::{Pipeline, Result, Session};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one device session, the pipeline it feeds and the loop between them.
///
/// `stop` cancels the loop, releases the device and resets the pipeline's
/// state. Once it returns no tick reaches the device or the pipeline.
pub struct LiveCapture<D, P>
where
    D: CaptureDevice + Send + 'static,
    D::Handle: Send,
    P: Pipeline + Send + 'static,
{
    name: &'static str,
    session: Arc<Mutex<Session<D>>>,
    pipeline: Arc<Mutex<P>>,
    task: Option<ScheduledTask>,
}

impl<D, P> LiveCapture<D, P>
where
    D: CaptureDevice + Send + 'static,
    D::Handle: Send,
    P: Pipeline + Send + 'static,
{
    pub fn new(name: &'static str, session: Session<D>, pipeline: P) -> Self {
        Self {
            name,
            session: Arc::new(Mutex::new(session)),
            pipeline: Arc::new(Mutex::new(pipeline)),
            task: None,
        }
    }

    /// Open a device and run `tick` every `period` with the pipeline and the
    /// open stream. Anything already running is stopped first. `tick`
    /// returning `false` ends the loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(
        &mut self,
        preferred: Option<&str>,
        period: Duration,
        mut tick: F,
    ) -> Result<String>
    where
        F: FnMut(&mut P, &mut D::Handle) -> bool + Send + 'static,
    {
        self.stop();
        let id = lock(&self.session).start(preferred)?;
        lock(&self.pipeline).start();

        let session = Arc::clone(&self.session);
        let pipeline = Arc::clone(&self.pipeline);
        self.task = Some(ScheduledTask::spawn(
            self.name,
            period,
            CancellationToken::new(),
            move || {
                let mut session = lock(&session);
                let Some(handle) = session.handle_mut() else {
                    return false;
                };
                tick(&mut lock(&pipeline), handle)
            },
        ));
        Ok(id)
    }

    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // Dropping cancels; a tick already in flight finishes under the session lock.
        drop(task);
        lock(&self.session).stop();
        lock(&self.pipeline).stop();
        log::debug!("{} capture stopped", self.name);
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && lock(&self.session).is_running()
    }

    pub fn device_id(&self) -> Option<String> {
        lock(&self.session).device_id().map(str::to_string)
    }

    pub fn status_message(&self) -> Option<String> {
        lock(&self.session).status_message()
    }
}

impl<D, P> Drop for LiveCapture<D, P>
where
    D: CaptureDevice + Send + 'static,
    D::Handle: Send,
    P: Pipeline + Send + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
