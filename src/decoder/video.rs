use super::source::SourceInfo;

#[cfg(feature = "opencv")]
use opencv::{core, prelude::*, videoio};

#[cfg(feature = "opencv")]
use super::frame_data::ChannelOrder;
use super::frame_data::Frame;
use super::source::FrameSource;
use crate::error::{ChunkError, Result};

#[cfg_attr(not(feature = "opencv"), allow(dead_code))]
pub struct VideoDecoder {
    #[cfg(feature = "opencv")]
    capture: videoio::VideoCapture,
    info: SourceInfo,
    next_index: u64,
    released: bool,
}

#[cfg(feature = "opencv")]
impl VideoDecoder {
    pub fn open(path: &str) -> Result<Self> {
        crate::utils::logger::debug(&format!("Opening video with OpenCV: {}", path));

        let unavailable =
            |e: opencv::Error| ChunkError::SourceUnavailable(format!("{}: {}", path, e));

        // CAP_ANY allows OpenCV to choose the best backend
        let capture =
            videoio::VideoCapture::from_file(path, videoio::CAP_ANY).map_err(unavailable)?;
        if !capture.is_opened().map_err(unavailable)? {
            let msg = format!("Failed to open video file: {}", path);
            crate::utils::logger::error(&msg);
            return Err(ChunkError::SourceUnavailable(msg));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).map_err(unavailable)?;
        let total_frames = capture.get(videoio::CAP_PROP_FRAME_COUNT).map_err(unavailable)?;
        let position = capture.get(videoio::CAP_PROP_POS_FRAMES).map_err(unavailable)?;

        if !(fps.is_finite() && fps > 0.0) {
            let message = format!("{}: backend reported fps {}", path, fps);
            return Err(ChunkError::SourceUnavailable(message));
        }

        crate::utils::logger::debug(&format!(
            "VideoCapture opened: fps={} frames={} position={}",
            fps, total_frames, position
        ));

        Ok(Self {
            capture,
            info: SourceInfo {
                name: display_name(path),
                target_fps: fps,
                total_frames: total_frames.max(0.0) as u64,
            },
            next_index: position.max(0.0) as u64 + 1,
            released: false,
        })
    }
}

#[cfg(not(feature = "opencv"))]
impl VideoDecoder {
    pub fn open(path: &str) -> Result<Self> {
        Err(ChunkError::SourceUnavailable(format!(
            "{}: built without the `opencv` feature, video decoding is unavailable",
            display_name(path)
        )))
    }
}

#[cfg(not(feature = "opencv"))]
impl FrameSource for VideoDecoder {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Err(ChunkError::SourceUnavailable(format!(
            "{}: no decoder for frame {}",
            self.info.name, self.next_index
        )))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(feature = "opencv")]
impl FrameSource for VideoDecoder {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }

        let index = self.next_index;
        let decode_failed = |e: opencv::Error| {
            ChunkError::SourceUnavailable(format!("decoding failed at frame {}: {}", index, e))
        };

        let mut image = core::Mat::default();
        if !self.capture.read(&mut image).map_err(decode_failed)? {
            return Ok(None); // EOF
        }
        if image.empty() {
            return Ok(None);
        }

        let width = image.cols() as u32;
        let height = image.rows() as u32;
        let buffer = if image.is_continuous() {
            image.data_bytes().map_err(decode_failed)?.to_vec()
        } else {
            let copy = image.try_clone().map_err(decode_failed)?;
            copy.data_bytes().map_err(decode_failed)?.to_vec()
        };

        self.next_index += 1;
        Ok(Some(Frame::new(index, self.info.target_fps, buffer, width, height, ChannelOrder::Bgr)))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.capture.release() {
            crate::utils::logger::error(&format!("VideoCapture release failed: {}", e));
        } else {
            crate::utils::logger::debug(&format!("Released {}", self.info.name));
        }
    }
}

#[cfg(feature = "opencv")]
impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn display_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_directories() {
        assert_eq!(display_name("/videos/session/clip.mp4"), "clip.mp4");
        assert_eq!(display_name("clip.mp4"), "clip.mp4");
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_open_rejects_file_that_is_not_a_video() {
        let path = std::env::temp_dir().join("vchunk_not_a_video.mp4");
        std::fs::write(&path, b"plain text, no container").unwrap();

        let result = VideoDecoder::open(&path.to_string_lossy());
        std::fs::remove_file(&path).ok();
        match result {
            Err(ChunkError::SourceUnavailable(msg)) => {
                assert!(msg.contains("vchunk_not_a_video.mp4"));
                assert!(!msg.contains("built without"));
            }
            _ => panic!("expected SourceUnavailable"),
        }
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_open_missing_file_is_unavailable() {
        assert!(matches!(
            VideoDecoder::open("/nonexistent/vchunk/clip.mp4"),
            Err(ChunkError::SourceUnavailable(_))
        ));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_open_without_backend_is_unavailable() {
        match VideoDecoder::open("clip.mp4") {
            Err(ChunkError::SourceUnavailable(msg)) => assert!(msg.contains("opencv")),
            _ => panic!("expected SourceUnavailable"),
        }
    }
}
