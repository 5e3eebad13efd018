use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "fatal" => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogComponent {
    Typesetter,
    Converter,
    Queue,
    Orchestrator,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub raw_line: String,
    pub file_path: Option<String>,
    pub line_number: Option<usize>,
    pub component: LogComponent,
    pub index: usize,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: String,
        raw_line: String,
        component: LogComponent,
        index: usize,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message,
            raw_line,
            file_path: None,
            line_number: None,
            component,
            index,
        }
    }

    pub fn internal(level: LogLevel, component: LogComponent, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(level, message.clone(), message, component, 0)
    }

    pub fn with_location(mut self, file_path: Option<String>, line_number: Option<usize>) -> Self {
        self.file_path = file_path;
        self.line_number = line_number;
        self
    }

    pub fn location_string(&self) -> Option<String> {
        match (&self.file_path, self.line_number) {
            (Some(path), Some(line)) => Some(format!("{}:{}", path, line)),
            (Some(path), None) => Some(path.clone()),
            (None, Some(line)) => Some(format!("line {}", line)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering_and_parsing() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_location_string() {
        let entry = LogEntry::internal(LogLevel::Error, LogComponent::Typesetter, "oops")
            .with_location(Some("ztmp1.tex".to_string()), Some(12));
        assert_eq!(entry.location_string(), Some("ztmp1.tex:12".to_string()));

        let entry = LogEntry::internal(LogLevel::Error, LogComponent::Typesetter, "oops")
            .with_location(None, Some(3));
        assert_eq!(entry.location_string(), Some("line 3".to_string()));
    }
}
