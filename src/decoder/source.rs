use super::frame_data::Frame;
use crate::error::Result;

/// Static facts about an opened source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub target_fps: f64,
    /// Best effort; containers may report an approximate count.
    pub total_frames: u64,
}

impl SourceInfo {
    pub fn total_duration_s(&self) -> f64 {
        if self.target_fps > 0.0 {
            self.total_frames as f64 / self.target_fps
        } else {
            0.0
        }
    }
}

/// Ordered, finite stream of frames.
///
/// Indices increase by exactly one with no gaps. `Ok(None)` is the end of the
/// stream; a decode failure is `Err(ChunkError::SourceUnavailable)`.
pub trait FrameSource {
    fn info(&self) -> &SourceInfo;

    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Give back the decoding resource. Must be safe to call more than once.
    fn release(&mut self) {}
}

/// Owns a source for the length of a run and releases it on every exit path.
pub struct SourceGuard<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: FrameSource> std::ops::Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> std::ops::DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.release();
    }
}
