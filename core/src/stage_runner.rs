use tokio::sync::mpsc;

use crate::executor;
use crate::logger::BuildLog;
use crate::parser::LogComponent;
use crate::stage::Stage;

// Launches a stage without blocking. The exit status comes back later
// through whatever channel the implementation is wired to.
pub trait StageRunner {
    fn dispatch(&mut self, stage: Stage);
}

pub struct ProcessRunner {
    statuses: mpsc::UnboundedSender<i32>,
    log: BuildLog,
}

impl ProcessRunner {
    pub fn new(statuses: mpsc::UnboundedSender<i32>, log: BuildLog) -> Self {
        Self { statuses, log }
    }
}

impl StageRunner for ProcessRunner {
    fn dispatch(&mut self, stage: Stage) {
        let statuses = self.statuses.clone();
        let log = self.log.clone();

        tokio::spawn(async move {
            log.info(LogComponent::Queue, format!("running `{}`", stage));
            let result = executor::execute_stage(&stage, &log).await;
            log.debug(
                LogComponent::Queue,
                format!(
                    "`{}` exited with {} after {:.2}s",
                    stage.program(),
                    result.status,
                    result.duration
                ),
            );
            // Only fails once the service task is gone, and then nobody is waiting.
            let _ = statuses.send(result.status);
        });
    }
}
