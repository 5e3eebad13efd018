pub mod entry;
pub mod filters;
pub mod parser;

pub use entry::{LogComponent, LogEntry, LogLevel};
pub use filters::{console_filter, ComponentFilter, CompositeFilter, LevelFilter, LogFilter};
pub use parser::TexOutputParser;
