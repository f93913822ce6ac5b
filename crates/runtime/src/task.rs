use std::future::Future;

use tokio::task::JoinHandle;

/// Handle to a spawned background sequence (animation, playback).
///
/// Dropping the handle detaches the task; call [`TaskHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct TaskHandle {
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            join: tokio::spawn(fut),
        }
    }

    pub fn cancel(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task. Returns `false` if it was cancelled.
    pub async fn join(self) -> bool {
        match self.join.await {
            Ok(()) => true,
            Err(e) if e.is_cancelled() => false,
            Err(e) => {
                tracing::error!("background task panicked: {e}");
                false
            }
        }
    }
}
