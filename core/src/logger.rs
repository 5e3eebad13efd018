use crate::parser::entry::{LogComponent, LogEntry, LogLevel};
use crate::parser::filters::LogFilter;
use std::io::Write;
use tokio::sync::mpsc;

pub struct Logger {
    use_colors: bool,
    show_timestamps: bool,
    filter: Option<Box<dyn LogFilter>>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
            show_timestamps: true,
            filter: None,
        }
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    pub fn with_filter(mut self, filter: Box<dyn LogFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn log_entry(&self, entry: &LogEntry) {
        if let Some(filter) = &self.filter {
            if !filter.matches(entry) {
                return;
            }
        }

        if self.use_colors {
            self.log_colored(entry);
        } else {
            self.log_plain(entry);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if self.use_colors {
            println!("{}{}\x1b[0m", level_color(level), message);
        } else {
            println!("{}", message);
        }
    }

    pub async fn drain(&self, mut log_rx: mpsc::UnboundedReceiver<LogEntry>) {
        while let Some(entry) = log_rx.recv().await {
            self.log_entry(&entry);
        }
    }

    fn prefix(&self, entry: &LogEntry) -> String {
        if self.show_timestamps {
            format!("[{}] ", entry.timestamp.format("%H:%M:%S"))
        } else {
            String::new()
        }
    }

    fn log_colored(&self, entry: &LogEntry) {
        let color = level_color(entry.level);
        let prefix = self.prefix(entry);

        if let Some(location) = entry.location_string() {
            println!(
                "\x1b[90m{}\x1b[0m{}{}\x1b[0m \x1b[36m{}\x1b[0m",
                prefix, color, entry.message, location
            );
        } else {
            println!("\x1b[90m{}\x1b[0m{}{}\x1b[0m", prefix, color, entry.message);
        }

        let _ = std::io::stdout().flush();
    }

    fn log_plain(&self, entry: &LogEntry) {
        let prefix = self.prefix(entry);

        if let Some(location) = entry.location_string() {
            println!("{}{} ({})", prefix, entry.message, location);
        } else {
            println!("{}{}", prefix, entry.message);
        }

        let _ = std::io::stdout().flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "\x1b[90m",
        LogLevel::Info => "\x1b[37m",
        LogLevel::Warning => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Fatal => "\x1b[31;1m",
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    tx: Option<mpsc::UnboundedSender<LogEntry>>,
}

impl BuildLog {
    pub fn new(tx: mpsc::UnboundedSender<LogEntry>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, entry: LogEntry) {
        if let Some(tx) = &self.tx {
            // The receiver going away only means nobody is watching.
            let _ = tx.send(entry);
        }
    }

    pub fn emit(&self, level: LogLevel, component: LogComponent, message: impl Into<String>) {
        self.send(LogEntry::internal(level, component, message));
    }

    pub fn debug(&self, component: LogComponent, message: impl Into<String>) {
        self.emit(LogLevel::Debug, component, message);
    }

    pub fn info(&self, component: LogComponent, message: impl Into<String>) {
        self.emit(LogLevel::Info, component, message);
    }

    pub fn warn(&self, component: LogComponent, message: impl Into<String>) {
        self.emit(LogLevel::Warning, component, message);
    }

    pub fn error(&self, component: LogComponent, message: impl Into<String>) {
        self.emit(LogLevel::Error, component, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_log_channel() {
        let (log, mut rx) = BuildLog::channel();
        log.warn(LogComponent::Queue, "halted");

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.component, LogComponent::Queue);
        assert_eq!(entry.message, "halted");
    }

    #[test]
    fn test_disabled_log_is_silent() {
        let log = BuildLog::disabled();
        log.error(LogComponent::Orchestrator, "nobody hears this");
    }
}
