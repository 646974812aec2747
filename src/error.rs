//! Error taxonomy for a chunk extraction run.
//!
//! Every variant is fatal to the run it occurs in. Interruption by the user
//! is not an error and is reported through `RunOutcome::Interrupted`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("engine initialization failed: {0}")]
    EngineInitializationFailed(String),

    #[error("collector creation failed: {0}")]
    CollectorCreationFailed(String),

    #[error("no annotation for frame {frame}")]
    AnnotationMissing { frame: u64 },

    #[error("failed to load annotations: {0}")]
    AnnotationLoadFailed(String),

    #[error("engine entered ERROR at frame {frame}: {message}")]
    EngineRuntimeError { frame: u64, message: String },

    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error(
        "chunk sequence violated: expected chunk {expected} of {number_chunks}, \
         engine produced {actual}"
    )]
    ChunkSequenceViolation {
        expected: u32,
        actual: u32,
        number_chunks: u32,
    },

    #[error("output directory {} unavailable: {source}", .path.display())]
    OutputUnavailable {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist chunk {chunk}: {source}")]
    PersistFailed {
        chunk: u32,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChunkError>;
