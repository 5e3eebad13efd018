// The build queue as a single actor task. Queue mutations happen only
// inside that task, so submissions, stage completions and
// acknowledgements are serialized without locks.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{BuildError, BuildResult};
use crate::logger::BuildLog;
use crate::parser::LogComponent;
use crate::queue::{BuildQueue, Job, QueueSnapshot};
use crate::stage_runner::ProcessRunner;

#[derive(Debug)]
pub enum QueueCommand {
    Submit(Job),
    Acknowledge(oneshot::Sender<usize>),
    Snapshot(oneshot::Sender<QueueSnapshot>),
}

pub struct BuildService;

impl BuildService {
    // Starts the queue task. Once every `QueueHandle` is gone it keeps
    // running until the current work drains, then exits.
    pub fn spawn(log: BuildLog) -> (QueueHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueueCommand>();
        let (status_tx, mut status_rx) = mpsc::unbounded_channel::<i32>();
        let runner = ProcessRunner::new(status_tx, log.clone());
        let mut queue = BuildQueue::new(runner, log.clone());

        let task = tokio::spawn(async move {
            let mut handles_open = true;

            loop {
                // Halted work can never resume without a handle to acknowledge it.
                if !handles_open && !queue.is_running() {
                    break;
                }

                tokio::select! {
                    command = rx.recv(), if handles_open => match command {
                        Some(QueueCommand::Submit(job)) => queue.submit(job),
                        Some(QueueCommand::Acknowledge(reply)) => {
                            let _ = reply.send(queue.acknowledge());
                        }
                        Some(QueueCommand::Snapshot(reply)) => {
                            let _ = reply.send(queue.snapshot());
                        }
                        None => handles_open = false,
                    },
                    Some(status) = status_rx.recv() => queue.on_stage_complete(status),
                }
            }

            log.debug(LogComponent::Queue, "build service stopped");
        });

        (QueueHandle { tx }, task)
    }
}

#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<QueueCommand>,
}

impl QueueHandle {
    pub fn submit(&self, job: Job) -> BuildResult<()> {
        self.tx
            .send(QueueCommand::Submit(job))
            .map_err(|_| BuildError::ServiceClosed)
    }

    // Returns a halted queue to idle and reports how many jobs queued
    // during the halt were dropped.
    pub async fn acknowledge(&self) -> BuildResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Acknowledge(reply))
            .map_err(|_| BuildError::ServiceClosed)?;
        rx.await.map_err(|_| BuildError::ServiceClosed)
    }

    pub async fn snapshot(&self) -> BuildResult<QueueSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Snapshot(reply))
            .map_err(|_| BuildError::ServiceClosed)?;
        rx.await.map_err(|_| BuildError::ServiceClosed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::queue::QueueState;
    use crate::stage::Stage;

    fn sh(dir: &std::path::Path, script: &str) -> Stage {
        Stage::new("sh", vec!["-c".to_string(), script.to_string()], dir)
    }

    #[tokio::test]
    async fn test_jobs_complete_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = BuildService::spawn(BuildLog::disabled());

        let (first, first_handle) = Job::new(
            "first",
            vec![sh(dir.path(), "sleep 0.1; echo a >> order"), sh(dir.path(), "echo b >> order")],
        )
        .with_completion();
        let (second, second_handle) =
            Job::new("second", vec![sh(dir.path(), "echo c >> order")]).with_completion();

        queue.submit(first).unwrap();
        queue.submit(second).unwrap();

        assert_eq!(first_handle.wait().await.unwrap(), 0);
        assert_eq!(second_handle.wait().await.unwrap(), 0);

        let order = std::fs::read_to_string(dir.path().join("order")).unwrap();
        assert_eq!(order, "a\nb\nc\n");
        assert_eq!(queue.snapshot().await.unwrap().state, QueueState::Idle);
    }

    #[tokio::test]
    async fn test_halt_then_acknowledge() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _task) = BuildService::spawn(BuildLog::disabled());

        let (failing, failing_handle) = Job::new(
            "failing",
            vec![sh(dir.path(), "true"), sh(dir.path(), "exit 1")],
        )
        .with_completion();
        let (follower, follower_handle) =
            Job::new("follower", vec![sh(dir.path(), "touch ran")]).with_completion();

        queue.submit(failing).unwrap();
        queue.submit(follower).unwrap();

        assert_eq!(failing_handle.wait().await.unwrap(), 1);
        assert!(matches!(follower_handle.wait().await, Err(BuildError::QueueHalted)));
        assert!(!dir.path().join("ran").exists());

        let snapshot = queue.snapshot().await.unwrap();
        assert_eq!(snapshot.state, QueueState::Halted);

        assert_eq!(queue.acknowledge().await.unwrap(), 0);
        let (retry, retry_handle) =
            Job::new("retry", vec![sh(dir.path(), "touch ran")]).with_completion();
        queue.submit(retry).unwrap();
        assert_eq!(retry_handle.wait().await.unwrap(), 0);
        assert!(dir.path().join("ran").exists());
    }

    #[tokio::test]
    async fn test_running_job_finishes_after_handles_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, task) = BuildService::spawn(BuildLog::disabled());

        let (job, handle) = Job::new(
            "orphan",
            vec![sh(dir.path(), "true"), sh(dir.path(), "touch second")],
        )
        .with_completion();
        queue.submit(job).unwrap();
        drop(queue);

        assert_eq!(handle.wait().await.unwrap(), 0);
        assert!(dir.path().join("second").exists());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_service_stops_when_handles_dropped() {
        let (queue, task) = BuildService::spawn(BuildLog::disabled());
        drop(queue);
        task.await.unwrap();
    }
}
