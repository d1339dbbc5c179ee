//! Background task handle with cooperative shutdown.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Message asking a background task to stop at its next safe point.
pub struct Shutdown;

/// Handle to a spawned background task.
///
/// Dropping the handle also closes the channel, which tasks treat the same
/// as an explicit [`shutdown`](TaskHandle::shutdown).
pub struct TaskHandle {
    sender: mpsc::Sender<Shutdown>,
    task: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `body` on the runtime, handing it the receiving end of the
    /// shutdown channel.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<Shutdown>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(1);
        let task = tokio::spawn(body(receiver));
        Self { sender, task }
    }

    /// Ask the task to stop and wait until it has.
    pub async fn shutdown(self) {
        let _ = self.sender.send(Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "background task ended abnormally");
        }
    }
}
