use super::entry::{LogComponent, LogEntry, LogLevel};

pub trait LogFilter: Send + Sync {
    fn matches(&self, entry: &LogEntry) -> bool;
    fn description(&self) -> String;
}

pub struct LevelFilter {
    min_level: LogLevel,
}

impl LevelFilter {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl LogFilter for LevelFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        entry.level >= self.min_level
    }

    fn description(&self) -> String {
        format!("level >= {}", self.min_level.to_str())
    }
}

pub struct ComponentFilter {
    component: LogComponent,
}

impl ComponentFilter {
    pub fn new(component: LogComponent) -> Self {
        Self { component }
    }
}

impl LogFilter for ComponentFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        entry.component == self.component
    }

    fn description(&self) -> String {
        format!("component: {:?}", self.component)
    }
}

pub struct CompositeFilter {
    filters: Vec<Box<dyn LogFilter>>,
    mode: FilterMode,
}

pub enum FilterMode {
    And,
    Or,
}

impl CompositeFilter {
    pub fn new(filters: Vec<Box<dyn LogFilter>>, mode: FilterMode) -> Self {
        Self { filters, mode }
    }

    pub fn and(filters: Vec<Box<dyn LogFilter>>) -> Self {
        Self::new(filters, FilterMode::And)
    }

    pub fn or(filters: Vec<Box<dyn LogFilter>>) -> Self {
        Self::new(filters, FilterMode::Or)
    }
}

impl LogFilter for CompositeFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        match self.mode {
            FilterMode::And => self.filters.iter().all(|f| f.matches(entry)),
            FilterMode::Or => self.filters.iter().any(|f| f.matches(entry)),
        }
    }

    fn description(&self) -> String {
        let mode = match self.mode {
            FilterMode::And => "AND",
            FilterMode::Or => "OR",
        };
        let descriptions: Vec<_> = self.filters.iter().map(|f| f.description()).collect();
        format!("({})", descriptions.join(&format!(" {} ", mode)))
    }
}

// Everything at or above `min_level`, plus queue and orchestrator
// messages at info and above.
pub fn console_filter(min_level: LogLevel) -> CompositeFilter {
    CompositeFilter::or(vec![
        Box::new(LevelFilter::new(min_level)),
        Box::new(CompositeFilter::and(vec![
            Box::new(LevelFilter::new(LogLevel::Info)),
            Box::new(CompositeFilter::or(vec![
                Box::new(ComponentFilter::new(LogComponent::Queue)),
                Box::new(ComponentFilter::new(LogComponent::Orchestrator)),
            ])),
        ])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_filter_keeps_queue_info() {
        let filter = console_filter(LogLevel::Error);

        let queue = LogEntry::internal(LogLevel::Info, LogComponent::Queue, "halted");
        let chatter = LogEntry::internal(LogLevel::Info, LogComponent::Typesetter, "page 1");
        let error = LogEntry::internal(LogLevel::Error, LogComponent::Converter, "bad");
        let debug = LogEntry::internal(LogLevel::Debug, LogComponent::Queue, "dispatch");

        assert!(filter.matches(&queue));
        assert!(!filter.matches(&chatter));
        assert!(filter.matches(&error));
        assert!(!filter.matches(&debug));
    }

    #[test]
    fn test_description() {
        let filter = CompositeFilter::and(vec![
            Box::new(LevelFilter::new(LogLevel::Warning)),
            Box::new(ComponentFilter::new(LogComponent::Queue)),
        ]);
        assert_eq!(filter.description(), "(level >= WARNING AND component: Queue)");
    }
}
