use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::ChunkPayload;
use crate::error::{ChunkError, Result};
use crate::shared::constants;
use crate::utils::file_utils;

/// Destination for completed chunks.
pub trait PayloadSink {
    fn accept(&mut self, payload: &ChunkPayload) -> Result<()>;
}

/// No output configured: chunks are dropped after logging.
impl<S: PayloadSink> PayloadSink for Option<S> {
    fn accept(&mut self, payload: &ChunkPayload) -> Result<()> {
        match self {
            Some(sink) => sink.accept(payload),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChunkProperties {
    pub valid: bool,
    pub start_frame: u64,
    pub end_frame: u64,
    pub chunk_number: u32,
    pub number_chunks: u32,
    pub first_chunk_start_time_s: f64,
    pub start_time_s: f64,
    pub end_time_s: f64,
    pub duration_s: f64,
}

impl From<&ChunkPayload> for ChunkProperties {
    fn from(p: &ChunkPayload) -> Self {
        Self {
            valid: p.valid,
            start_frame: p.start_frame,
            end_frame: p.end_frame,
            chunk_number: p.chunk_number,
            number_chunks: p.number_chunks,
            first_chunk_start_time_s: p.first_chunk_start_time_s,
            start_time_s: p.start_time_s,
            end_time_s: p.end_time_s,
            duration_s: p.duration_s,
        }
    }
}

/// Writes `properties{n}.json`, `payload{n}.bin` and `metadata{n}.bin` per chunk.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        file_utils::ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chunk_path(&self, prefix: &str, chunk_number: u32, extension: &str) -> PathBuf {
        self.dir.join(format!("{}{}.{}", prefix, chunk_number, extension))
    }
}

impl PayloadSink for DirectorySink {
    fn accept(&mut self, payload: &ChunkPayload) -> Result<()> {
        let chunk = payload.chunk_number;
        let persist = |source: std::io::Error| ChunkError::PersistFailed { chunk, source };

        let properties =
            serde_json::to_vec(&ChunkProperties::from(payload)).map_err(|e| persist(e.into()))?;

        // properties{n}.json goes last: its presence marks a complete chunk.
        let payload_path = self.chunk_path(constants::PAYLOAD_FILE_PREFIX, chunk, "bin");
        file_utils::write_file(&payload_path, &payload.payload_data).map_err(persist)?;
        let metadata_path = self.chunk_path(constants::METADATA_FILE_PREFIX, chunk, "bin");
        file_utils::write_file(&metadata_path, &payload.metadata).map_err(persist)?;
        let properties_path = self.chunk_path(constants::PROPERTIES_FILE_PREFIX, chunk, "json");
        file_utils::write_file(&properties_path, &properties).map_err(persist)?;

        crate::utils::logger::debug(&format!("chunk {} written to {}", chunk, self.dir.display()));
        Ok(())
    }
}
