// Serial build queue.
// At most one stage of one job is in flight at any time. Jobs run in
// submission order and their stages run front to back. A failed stage in
// a `stop_on_error` job halts the queue and discards everything queued
// behind it until the halt is acknowledged.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

use crate::error::{BuildError, BuildResult};
use crate::logger::BuildLog;
use crate::parser::LogComponent;
use crate::stage::Stage;
use crate::stage_runner::StageRunner;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

pub type JobId = u64;

pub struct Job {
    id: JobId,
    label: String,
    stages: VecDeque<Stage>,
    stop_on_error: bool,
    completion: Option<oneshot::Sender<i32>>,
}

impl Job {
    pub fn new(label: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            stages: stages.into(),
            stop_on_error: true,
            completion: None,
        }
    }

    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_completion(mut self) -> (Self, JobHandle) {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        let handle = JobHandle {
            id: self.id,
            label: self.label.clone(),
            rx,
        };
        (self, handle)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn remaining_stages(&self) -> usize {
        self.stages.len()
    }

    fn complete(mut self, status: i32) {
        if let Some(tx) = self.completion.take() {
            // A dropped handle means the caller stopped caring.
            let _ = tx.send(status);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("stages", &self.stages)
            .field("stop_on_error", &self.stop_on_error)
            .finish()
    }
}

// Resolves exactly once: with the job's status, or with
// `BuildError::QueueHalted` if the job was discarded before it ran.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    label: String,
    rx: oneshot::Receiver<i32>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn wait(self) -> BuildResult<i32> {
        self.rx.await.map_err(|_| BuildError::QueueHalted)
    }

    pub fn try_status(&mut self) -> Option<BuildResult<i32>> {
        match self.rx.try_recv() {
            Ok(status) => Some(Ok(status)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BuildError::QueueHalted)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
    Halted,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueState::Idle => "idle",
            QueueState::Running => "running",
            QueueState::Halted => "halted",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub state: QueueState,
    pub pending_jobs: usize,
    pub current_job: Option<String>,
}

pub struct BuildQueue<R: StageRunner> {
    pending: VecDeque<Job>,
    state: QueueState,
    in_flight: bool,
    runner: R,
    log: BuildLog,
}

impl<R: StageRunner> BuildQueue<R> {
    pub fn new(runner: R, log: BuildLog) -> Self {
        Self {
            pending: VecDeque::new(),
            state: QueueState::Idle,
            in_flight: false,
            runner,
            log,
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == QueueState::Running
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            state: self.state,
            pending_jobs: self.pending.len(),
            current_job: self.pending.front().map(|job| job.label.clone()),
        }
    }

    pub fn submit(&mut self, job: Job) {
        self.log.debug(
            LogComponent::Queue,
            format!("queued {} ({} stages)", job.label, job.stages.len()),
        );
        self.pending.push_back(job);

        match self.state {
            QueueState::Idle => {
                self.state = QueueState::Running;
                self.advance();
            }
            QueueState::Running => {}
            QueueState::Halted => {
                self.log.warn(
                    LogComponent::Queue,
                    "queue is halted; job will not run until the failure is acknowledged",
                );
            }
        }
    }

    pub fn on_stage_complete(&mut self, status: i32) {
        if !self.in_flight {
            self.log.warn(
                LogComponent::Queue,
                format!("ignoring stage completion ({status}) with nothing in flight"),
            );
            return;
        }
        self.in_flight = false;

        let Some(head) = self.pending.front() else {
            self.state = QueueState::Idle;
            return;
        };

        let stop_on_error = head.stop_on_error;
        if status != 0 || head.stages.is_empty() {
            if let Some(job) = self.pending.pop_front() {
                if status == 0 {
                    self.log
                        .info(LogComponent::Queue, format!("{} finished", job.label));
                } else {
                    self.log.error(
                        LogComponent::Queue,
                        format!("{} failed with status {}", job.label, status),
                    );
                }
                job.complete(status);
            }
        }

        if status == 0 || !stop_on_error {
            self.advance();
        } else {
            self.halt();
        }
    }

    // Clears a halt. Anything queued while halted is discarded.
    pub fn acknowledge(&mut self) -> usize {
        if self.state != QueueState::Halted {
            return 0;
        }

        let discarded = self.discard_pending();
        self.state = QueueState::Idle;
        self.log.info(
            LogComponent::Queue,
            format!("halt acknowledged; discarded {discarded} job(s) queued while halted"),
        );
        discarded
    }

    fn advance(&mut self) {
        loop {
            let Some(job) = self.pending.front_mut() else {
                self.state = QueueState::Idle;
                self.log.debug(LogComponent::Queue, "queue drained");
                return;
            };

            if let Some(stage) = job.stages.pop_front() {
                self.log
                    .debug(LogComponent::Queue, format!("{}: {}", job.label, stage));
                self.in_flight = true;
                self.runner.dispatch(stage);
                return;
            }

            if let Some(job) = self.pending.pop_front() {
                self.log
                    .info(LogComponent::Queue, format!("{} finished", job.label));
                job.complete(0);
            }
        }
    }

    fn halt(&mut self) {
        let discarded = self.discard_pending();
        self.state = QueueState::Halted;
        self.log.error(
            LogComponent::Queue,
            format!("build halted; discarded {discarded} queued job(s)"),
        );
    }

    fn discard_pending(&mut self) -> usize {
        let discarded = self.pending.len();
        for job in self.pending.drain(..) {
            self.log
                .debug(LogComponent::Queue, format!("discarding {}", job.label));
        }
        discarded
    }
}
