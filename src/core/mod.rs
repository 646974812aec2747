pub mod config;
pub mod orchestrator;
pub mod sink;

pub use config::RunConfig;
pub use orchestrator::{
    CancellationToken, ChunkOrchestrator, Progress, ProgressObserver, RunOutcome,
};
pub use sink::DirectorySink;
