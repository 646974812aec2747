//! Control contract of the extraction engine.
//!
//! The orchestrator drives any `ExtractionEngine` through the same state
//! machine:
//!
//! ```text
//! Uninitialized -> Collecting -> (ChunkReady -> Collecting)* -> Completed
//!                      \-> Error
//! ```
//!
//! `ChunkReady` only lives between one `submit` and the next.

pub mod collector;
pub mod study;

use std::fmt;

use crate::annotation::Annotation;
use crate::decoder::Frame;

pub use study::Factory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Uninitialized,
    Collecting,
    ChunkReady,
    Completed,
    Error,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectorState::Uninitialized => "UNINITIALIZED",
            CollectorState::Collecting => "COLLECTING",
            CollectorState::ChunkReady => "CHUNK_READY",
            CollectorState::Completed => "COMPLETED",
            CollectorState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub target_fps: f64,
    pub chunk_duration_s: f64,
    pub number_chunks: u32,
}

impl EngineConfig {
    /// Derive the chunk count from the expected length of the video.
    pub fn for_duration(target_fps: f64, chunk_duration_s: f64, total_duration_s: f64) -> Self {
        Self {
            target_fps,
            chunk_duration_s,
            number_chunks: number_chunks(total_duration_s, chunk_duration_s),
        }
    }
}

/// `ceil(total / chunk)`; more chunks than needed is harmless since the
/// stream end flushes whatever is left.
pub fn number_chunks(total_duration_s: f64, chunk_duration_s: f64) -> u32 {
    if !(chunk_duration_s > 0.0) || !(total_duration_s > 0.0) {
        return 0;
    }
    (total_duration_s / chunk_duration_s).ceil() as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPayload {
    pub valid: bool,
    pub start_frame: u64,
    pub end_frame: u64,
    pub chunk_number: u32,
    pub number_chunks: u32,
    pub first_chunk_start_time_s: f64,
    pub start_time_s: f64,
    pub end_time_s: f64,
    pub duration_s: f64,
    pub payload_data: Vec<u8>,
    pub metadata: Vec<u8>,
}

impl fmt::Display for ChunkPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {}/{} frames {}..={} {:.3}s-{:.3}s ({:.3}s){} payload={}B metadata={}B",
            self.chunk_number,
            self.number_chunks,
            self.start_frame,
            self.end_frame,
            self.start_time_s,
            self.end_time_s,
            self.duration_s,
            if self.valid { "" } else { " INVALID" },
            self.payload_data.len(),
            self.metadata.len()
        )
    }
}

/// Stateful extraction service, seen by the orchestrator as a black box.
pub trait ExtractionEngine {
    fn state(&self) -> CollectorState;

    fn last_error(&self) -> Option<&str>;

    /// Apply the run configuration. A rejected configuration leaves the
    /// engine in `Error`.
    fn configure(&mut self, config: EngineConfig) -> CollectorState;

    fn submit(&mut self, frame: &Frame, annotation: &Annotation) -> CollectorState;

    /// Hand out the chunk signalled by the last `ChunkReady`/`Completed`.
    /// A second call before the next `submit` returns `None`, as does a
    /// window with no usable frames.
    fn retrieve_pending_chunk(&mut self) -> Option<ChunkPayload>;

    /// Emit whatever frames remain once the source is exhausted. Honored once.
    fn request_final_flush(&mut self) -> Option<ChunkPayload>;

    fn number_chunks(&self) -> u32;

    fn chunk_duration_s(&self) -> f64;

    fn mode(&self) -> &str {
        "default"
    }

    fn enabled_constraints(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_chunks_is_ceiling() {
        assert_eq!(number_chunks(5.0, 5.0), 1);
        assert_eq!(number_chunks(130.0 / 30.0, 1.0), 5);
        assert_eq!(number_chunks(10.0, 3.0), 4);
        assert_eq!(number_chunks(0.1, 5.0), 1);
        assert_eq!(number_chunks(0.0, 5.0), 0);
    }

    #[test]
    fn test_number_chunks_matches_ceil_over_grid() {
        for total_tenths in 0..400u32 {
            for chunk_tenths in 1..80u32 {
                let total = total_tenths as f64 / 10.0;
                let chunk = chunk_tenths as f64 / 10.0;
                assert_eq!(number_chunks(total, chunk), (total / chunk).ceil() as u32);
            }
        }
    }

    #[test]
    fn test_config_from_source_duration() {
        let config = EngineConfig::for_duration(30.0, 5.0, 150.0 / 30.0);
        assert_eq!(config.number_chunks, 1);
        assert_eq!(config.target_fps, 30.0);
    }
}
