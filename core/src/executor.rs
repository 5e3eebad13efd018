use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::logger::BuildLog;
use crate::parser::{LogComponent, TexOutputParser};
use crate::stage::Stage;

pub const SPAWN_FAILURE_STATUS: i32 = 127;

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: i32,
    pub duration: f64,
    pub exit_code: Option<i32>,
    pub failure_reason: Option<String>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    fn spawn_failed(reason: String, start: Instant) -> Self {
        Self {
            status: SPAWN_FAILURE_STATUS,
            duration: start.elapsed().as_secs_f64(),
            exit_code: None,
            failure_reason: Some(reason),
        }
    }
}

// Runs one stage to completion and reduces the outcome to a status code.
// Output lines are classified and forwarded to `log`; they never
// influence the status.
pub async fn execute_stage(stage: &Stage, log: &BuildLog) -> ExecutionResult {
    let start = Instant::now();

    let spawned = Command::new(stage.program())
        .args(stage.arguments())
        .current_dir(stage.working_directory())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            let reason = format!("failed to spawn `{}`: {}", stage.program(), err);
            log.error(LogComponent::Queue, reason.clone());
            return ExecutionResult::spawn_failed(reason, start);
        }
    };

    let source = stage.arguments().last().cloned().unwrap_or_default();
    let parser = TexOutputParser::for_program(stage.program()).with_source(source);

    let stdout_task = child
        .stdout
        .take()
        .map(|out| tokio::spawn(forward_lines(out, parser.clone(), log.clone())));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(forward_lines(err, parser, log.clone())));

    let waited = child.wait().await;

    for task in [stdout_task, stderr_task].into_iter().flatten() {
        let _ = task.await;
    }

    let duration = start.elapsed().as_secs_f64();

    match waited {
        Ok(status) => {
            let (code, failure_reason) = status_code(&status);
            if let Some(reason) = &failure_reason {
                log.warn(
                    LogComponent::Queue,
                    format!("`{}` failed: {}", stage.program(), reason),
                );
            }
            ExecutionResult {
                status: code,
                duration,
                exit_code: status.code(),
                failure_reason,
            }
        }
        Err(err) => {
            let reason = format!("failed to wait for `{}`: {}", stage.program(), err);
            log.error(LogComponent::Queue, reason.clone());
            ExecutionResult::spawn_failed(reason, start)
        }
    }
}

async fn forward_lines<R>(reader: R, mut parser: TexOutputParser, log: BuildLog)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log.send(parser.parse_line(&line));
    }
}

fn status_code(status: &ExitStatus) -> (i32, Option<String>) {
    if let Some(code) = status.code() {
        let reason = (code != 0).then(|| format!("Exit code {}", code));
        return (code, reason);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let signal_name = match signal {
                1 => "SIGHUP (Hangup)",
                2 => "SIGINT (Interrupt)",
                3 => "SIGQUIT (Quit)",
                6 => "SIGABRT (Abort)",
                9 => "SIGKILL (Killed)",
                11 => "SIGSEGV (Segmentation fault)",
                13 => "SIGPIPE (Broken pipe)",
                15 => "SIGTERM (Terminated)",
                _ => "Unknown signal",
            };
            return (128 + signal, Some(format!("Signal {} ({})", signal, signal_name)));
        }
    }

    (1, Some("Abnormal termination".to_string()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::parser::LogLevel;

    #[tokio::test]
    async fn test_exit_codes_pass_through() {
        let log = BuildLog::disabled();
        let dir = std::env::temp_dir();

        let ok = execute_stage(&Stage::new("true", vec![], &dir), &log).await;
        assert_eq!(ok.status, 0);
        assert!(ok.success());

        let failed = execute_stage(
            &Stage::new("sh", vec!["-c".to_string(), "exit 3".to_string()], &dir),
            &log,
        )
        .await;
        assert_eq!(failed.status, 3);
        assert_eq!(failed.failure_reason.as_deref(), Some("Exit code 3"));
    }

    #[tokio::test]
    async fn test_missing_program_reports_127() {
        let (log, mut rx) = BuildLog::channel();
        let result = execute_stage(
            &Stage::new("slidedex-no-such-program", vec![], std::env::temp_dir()),
            &log,
        )
        .await;

        assert_eq!(result.status, SPAWN_FAILURE_STATUS);
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_runs_in_working_directory_and_forwards_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let (log, mut rx) = BuildLog::channel();

        let result = execute_stage(
            &Stage::new(
                "sh",
                vec!["-c".to_string(), "ls marker && echo '! LaTeX Error: boom'".to_string()],
                dir.path(),
            ),
            &log,
        )
        .await;
        drop(log);

        assert_eq!(result.status, 0);
        let mut messages = Vec::new();
        while let Some(entry) = rx.recv().await {
            messages.push((entry.level, entry.message));
        }
        assert!(messages.contains(&(LogLevel::Error, "boom".to_string())));
        assert!(messages.iter().any(|(_, m)| m == "marker"));
    }
}
