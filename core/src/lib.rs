pub mod cache;
pub mod cli;
pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod logger;
pub mod orchestrator;
pub mod parser;
pub mod queue;
pub mod service;
pub mod stage;
pub mod stage_runner;
pub mod staleness;

pub use cache::{Artifact, CacheStatus};
pub use cli::{Cli, Commands};
pub use command::CommandTemplate;
pub use config::Config;
pub use document::{Document, EntityId, Slide, SlideId};
pub use error::{BuildError, BuildResult};
pub use executor::{execute_stage, ExecutionResult};
pub use orchestrator::{BuildOrchestrator, BuildReport, BuildSettings, PendingCompile};
pub use queue::{BuildQueue, Job, JobHandle, QueueSnapshot, QueueState};
pub use service::{BuildService, QueueCommand, QueueHandle};
pub use stage::Stage;
pub use stage_runner::{ProcessRunner, StageRunner};
pub use staleness::{EntityKind, Staleness};
