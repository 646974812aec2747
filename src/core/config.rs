use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::shared::constants;

/// Everything the orchestrator needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub chunk_duration_s: f64,
    /// Observer cadence in frames; 0 disables progress reporting.
    pub progress_interval: u64,
    pub output_dir: Option<PathBuf>,
    /// Marker text attached to specific frame indices before submission.
    pub markers: BTreeMap<u64, Vec<String>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunk_duration_s: constants::DEFAULT_CHUNK_DURATION_S,
            progress_interval: constants::DEFAULT_PROGRESS_INTERVAL,
            output_dir: None,
            markers: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    pub fn add_marker(&mut self, frame: u64, text: impl Into<String>) {
        self.markers.entry(frame).or_default().push(text.into());
    }

    pub fn markers_for(&self, frame: u64) -> &[String] {
        self.markers.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parse a `FRAME=TEXT` marker argument.
pub fn parse_marker(arg: &str) -> Result<(u64, String), String> {
    let (frame, text) = arg
        .split_once('=')
        .ok_or_else(|| format!("marker {:?} is not FRAME=TEXT", arg))?;
    let frame = frame
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("marker frame {:?} is not a frame index", frame))?;
    if text.is_empty() {
        return Err(format!("marker for frame {} has no text", frame));
    }
    Ok((frame, text.to_string()))
}
