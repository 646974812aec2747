use std::cell::Cell;
use std::rc::Rc;

use super::frame_data::{ChannelOrder, Frame};
use super::source::{FrameSource, SourceInfo};
use crate::error::{ChunkError, Result};

/// Blank frames at a fixed rate, for driving the pipeline without a video file.
pub struct SyntheticSource {
    info: SourceInfo,
    first_index: u64,
    frames: u64,
    produced: u64,
    fail_at: Option<u64>,
    reads: Rc<Cell<u64>>,
    released: Rc<Cell<bool>>,
}

impl SyntheticSource {
    pub fn new(frames: u64, fps: f64) -> Self {
        Self {
            info: SourceInfo {
                name: "synthetic.mp4".to_string(),
                target_fps: fps,
                total_frames: frames,
            },
            first_index: 1,
            frames,
            produced: 0,
            fail_at: None,
            reads: Rc::new(Cell::new(0)),
            released: Rc::new(Cell::new(false)),
        }
    }

    /// Report a different frame count than the one actually produced.
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.info.total_frames = total;
        self
    }

    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn read_counter(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.reads)
    }

    pub fn release_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.released)
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.reads.set(self.reads.get() + 1);
        if self.produced >= self.frames {
            return Ok(None);
        }
        let index = self.first_index + self.produced;
        if self.fail_at == Some(index) {
            return Err(ChunkError::SourceUnavailable(format!("decode failed at frame {}", index)));
        }
        self.produced += 1;
        let buffer = vec![0u8; 4 * 4 * 3];
        Ok(Some(Frame::new(index, self.info.target_fps, buffer, 4, 4, ChannelOrder::Bgr)))
    }

    fn release(&mut self) {
        self.released.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::source::SourceGuard;

    #[test]
    fn test_indices_contiguous_from_one() {
        let mut source = SyntheticSource::new(5, 30.0);
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let source = SyntheticSource::new(1, 30.0);
        let released = source.release_flag();
        {
            let mut guard = SourceGuard::new(source);
            let _ = guard.next_frame();
            assert!(!released.get());
        }
        assert!(released.get());
    }
}
