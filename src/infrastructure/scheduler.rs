use crate::domain::ports::MainTask;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// Handle to the single execution context that runs world-mutating work.
///
/// Tasks run one at a time, in submission order, on one spawned task.
/// Cloning the handle shares the same context.
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: mpsc::UnboundedSender<MainTask>,
}

impl MainThreadHandle {
    /// Starts the context. It stops once every handle is dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MainTask>();
        let join = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                task.await;
            }
        });
        (Self { tx }, join)
    }

    pub fn submit(&self, task: MainTask) {
        if self.tx.send(task).is_err() {
            warn!("Main execution context has stopped; dropping task");
        }
    }

    /// Waits until every task submitted before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(Box::pin(async move {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let (main, _join) = MainThreadHandle::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            main.submit(Box::pin(async move {
                tokio::task::yield_now().await;
                seen.lock().unwrap().push(i);
            }));
        }
        main.flush().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_context_stops_when_handles_drop() {
        let (main, join) = MainThreadHandle::spawn();
        drop(main);
        join.await.unwrap();
    }
}
