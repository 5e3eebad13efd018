use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("stage exited with status {status}")]
    StageFailure { status: i32 },

    #[error("build queue halted after a failed stage; queued jobs were discarded")]
    QueueHalted,

    #[error("failed to write source file {}", path.display())]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load artifact {}", path.display())]
    ArtifactLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed document: {0}")]
    DocumentFormat(String),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document has not been given a file name yet")]
    Unsaved,

    #[error("no such entity: {0}")]
    UnknownEntity(String),

    #[error("build service is no longer running")]
    ServiceClosed,
}

pub type BuildResult<T> = Result<T, BuildError>;
