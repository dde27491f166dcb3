use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

struct Task {
    name: &'static str,
    fut: TaskFuture,
}

/// Fire-and-forget work that must not hold up a request.
///
/// Submitted tasks are handed to a runner loop which spawns each one on its
/// own tokio task. Failures are logged with the task name.
#[derive(Clone)]
pub struct BackgroundTasks {
    tx: mpsc::UnboundedSender<Task>,
}

impl BackgroundTasks {
    /// Create the handle and start the runner loop.
    pub fn start() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let runner = tokio::spawn(async move {
            while let Some(Task { name, fut }) = rx.recv().await {
                tokio::spawn(async move {
                    match fut.await {
                        Ok(()) => debug!(task = name, "Background task finished"),
                        Err(e) => error!(task = name, error = %e, "Background task failed"),
                    }
                });
            }
            debug!("Background task runner stopped");
        });
        (Self { tx }, runner)
    }

    pub fn submit<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = Task {
            name,
            fut: Box::pin(fut),
        };
        if self.tx.send(task).is_err() {
            warn!(task = name, "Background runner is gone, task dropped");
        }
    }
}
