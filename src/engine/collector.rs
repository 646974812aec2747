use serde::Serialize;

use super::study::Study;
use super::{ChunkPayload, CollectorState, EngineConfig, ExtractionEngine};
use crate::annotation::Annotation;
use crate::decoder::frame_data::frame_duration_ns;
use crate::decoder::{ChannelOrder, Frame};
use crate::shared::constants::NANOS_PER_SECOND;

/// Size of one encoded frame record in `ChunkPayload::payload_data`.
pub const RECORD_LEN: usize = 40;

const FLAG_DETECTED: u8 = 1;
const FLAG_POSE_VALID: u8 = 1 << 1;
const FLAG_USABLE: u8 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constraint {
    FaceDetected,
    PoseValid,
    LandmarksValid,
}

impl Constraint {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "face_detected" => Some(Constraint::FaceDetected),
            "pose_valid" => Some(Constraint::PoseValid),
            "landmarks_valid" => Some(Constraint::LandmarksValid),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Constraint::FaceDetected => "face_detected",
            Constraint::PoseValid => "pose_valid",
            Constraint::LandmarksValid => "landmarks_valid",
        }
    }

    fn accepts(self, annotation: &Annotation) -> bool {
        match self {
            Constraint::FaceDetected => annotation.detected,
            Constraint::PoseValid => annotation.pose_valid,
            Constraint::LandmarksValid => {
                !annotation.points.is_empty() && annotation.points.values().all(|p| p.valid)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameRecord {
    index: u64,
    timestamp_ns: i64,
    flags: u8,
    rect: [f32; 4],
    valid_points: u16,
}

impl FrameRecord {
    fn usable(&self) -> bool {
        self.flags & FLAG_USABLE != 0
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        out.push(self.flags);
        out.extend_from_slice(&[0u8; 3]);
        for v in self.rect {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&self.valid_points.to_le_bytes());
        out.extend_from_slice(&[0u8; 2]);
    }
}

#[derive(Debug, Clone, Serialize)]
struct MarkerEntry {
    frame: u64,
    text: String,
}

#[derive(Serialize)]
struct ChunkMetadata<'a> {
    study: &'a str,
    mode: &'a str,
    frames: usize,
    usable_frames: usize,
    frame_width: u32,
    frame_height: u32,
    channel_order: &'static str,
    markers: &'a [MarkerEntry],
}

/// Segments the frame stream into fixed-duration chunks and packs a compact
/// per-frame record for each one.
pub struct SegmentingCollector {
    study: Study,
    constraints: Vec<Constraint>,
    state: CollectorState,
    last_error: Option<String>,
    config: Option<EngineConfig>,
    frame_ns: f64,
    chunk_ns: f64,
    first_timestamp_ns: Option<i64>,
    last_frame: Option<(u64, i64)>,
    frame_format: (u32, u32, ChannelOrder),
    window: Vec<FrameRecord>,
    window_markers: Vec<MarkerEntry>,
    windows_closed: u32,
    chunks_emitted: u32,
    pending: Option<ChunkPayload>,
    flushed: bool,
}

impl SegmentingCollector {
    pub fn new(study: Study) -> Self {
        let mut collector = Self {
            study,
            constraints: Vec::new(),
            state: CollectorState::Uninitialized,
            last_error: None,
            config: None,
            frame_ns: 0.0,
            chunk_ns: 0.0,
            first_timestamp_ns: None,
            last_frame: None,
            frame_format: (0, 0, ChannelOrder::Bgr),
            window: Vec::new(),
            window_markers: Vec::new(),
            windows_closed: 0,
            chunks_emitted: 0,
            pending: None,
            flushed: false,
        };

        for name in collector.study.constraints.clone() {
            match Constraint::parse(&name) {
                Some(c) if !collector.constraints.contains(&c) => collector.constraints.push(c),
                Some(_) => {}
                None => {
                    let message = format!(
                        "study '{}' enables unknown constraint '{}'",
                        collector.study.name, name
                    );
                    collector.fail(message);
                    break;
                }
            }
        }
        collector
    }

    fn fail(&mut self, message: String) -> CollectorState {
        crate::utils::logger::error(&format!("collector: {}", message));
        self.state = CollectorState::Error;
        self.last_error = Some(message);
        self.pending = None;
        CollectorState::Error
    }

    fn is_usable(&self, annotation: &Annotation) -> bool {
        if self.constraints.is_empty() {
            annotation.detected
        } else {
            self.constraints.iter().all(|c| c.accepts(annotation))
        }
    }

    fn check_config(&self, config: &EngineConfig) -> Result<(), String> {
        if !(config.target_fps.is_finite() && config.target_fps > 0.0) {
            return Err(format!("target fps {} must be positive", config.target_fps));
        }
        if !(config.chunk_duration_s.is_finite() && config.chunk_duration_s > 0.0) {
            return Err(format!("chunk duration {}s must be positive", config.chunk_duration_s));
        }
        if config.chunk_duration_s * config.target_fps < 1.0 {
            return Err(format!(
                "chunk duration {}s is shorter than one frame at {} fps",
                config.chunk_duration_s, config.target_fps
            ));
        }
        if let Some(max) = self.study.max_chunk_duration_s {
            if config.chunk_duration_s > max {
                return Err(format!(
                    "chunk duration {}s exceeds the study maximum of {}s",
                    config.chunk_duration_s, max
                ));
            }
        }
        if config.number_chunks == 0 {
            return Err("number of chunks must be at least 1".into());
        }
        Ok(())
    }

    /// Turn the accumulated window into a payload. `Ok(None)` for a window
    /// without usable frames.
    fn close_window(&mut self) -> Result<Option<ChunkPayload>, String> {
        let frames = std::mem::take(&mut self.window);
        let markers = std::mem::take(&mut self.window_markers);
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return Ok(None);
        };

        let usable_frames = frames.iter().filter(|r| r.usable()).count();
        if usable_frames == 0 {
            crate::utils::logger::debug(&format!(
                "window {} (frames {}..={}) has no usable frames",
                self.windows_closed, first.index, last.index
            ));
            return Ok(None);
        }

        let mut raw = Vec::with_capacity(frames.len() * RECORD_LEN);
        for record in &frames {
            record.encode_into(&mut raw);
        }
        let payload_data = lz4::block::compress(&raw, None, true)
            .map_err(|e| format!("payload compression failed: {}", e))?;

        let metadata = serde_json::to_vec(&ChunkMetadata {
            study: &self.study.name,
            mode: &self.study.mode,
            frames: frames.len(),
            usable_frames,
            frame_width: self.frame_format.0,
            frame_height: self.frame_format.1,
            channel_order: match self.frame_format.2 {
                ChannelOrder::Bgr => "bgr",
            },
            markers: &markers,
        })
        .map_err(|e| format!("metadata encoding failed: {}", e))?;

        let first_chunk_start_ns = self.first_timestamp_ns.unwrap_or(first.timestamp_ns);
        let start_time_s = first.timestamp_ns as f64 / NANOS_PER_SECOND;
        let end_time_s = (last.timestamp_ns as f64 + self.frame_ns) / NANOS_PER_SECOND;
        let number_chunks = self.number_chunks();

        let payload = ChunkPayload {
            valid: usable_frames as f64 / frames.len() as f64 >= self.study.min_usable_ratio,
            start_frame: first.index,
            end_frame: last.index,
            chunk_number: self.chunks_emitted,
            number_chunks,
            first_chunk_start_time_s: first_chunk_start_ns as f64 / NANOS_PER_SECOND,
            start_time_s,
            end_time_s,
            duration_s: end_time_s - start_time_s,
            payload_data,
            metadata,
        };
        self.chunks_emitted += 1;
        Ok(Some(payload))
    }
}

impl ExtractionEngine for SegmentingCollector {
    fn state(&self) -> CollectorState {
        self.state
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn configure(&mut self, config: EngineConfig) -> CollectorState {
        match self.state {
            CollectorState::Uninitialized => {}
            CollectorState::Error => return CollectorState::Error,
            _ => return self.fail("collector is already configured".into()),
        }
        if let Err(message) = self.check_config(&config) {
            return self.fail(message);
        }

        self.frame_ns = frame_duration_ns(config.target_fps);
        self.chunk_ns = config.chunk_duration_s * NANOS_PER_SECOND;
        self.config = Some(config);
        self.state = CollectorState::Collecting;
        crate::utils::logger::debug(&format!(
            "collector configured: fps={} chunk={}s chunks={}",
            config.target_fps, config.chunk_duration_s, config.number_chunks
        ));
        self.state
    }

    fn submit(&mut self, frame: &Frame, annotation: &Annotation) -> CollectorState {
        match self.state {
            CollectorState::Collecting => {}
            CollectorState::ChunkReady => self.state = CollectorState::Collecting,
            CollectorState::Uninitialized => {
                return self.fail("frame submitted before configuration".into())
            }
            CollectorState::Completed | CollectorState::Error => return self.state,
        }
        let Some(config) = self.config else {
            return self.fail("collector has no configuration".into());
        };

        if let Some(stale) = self.pending.take() {
            let message = format!("chunk {} was never retrieved", stale.chunk_number);
            crate::utils::logger::warn(&message);
        }

        if let Some((last_index, last_ts)) = self.last_frame {
            if frame.index != last_index + 1 {
                let message = format!("frame {} does not follow frame {}", frame.index, last_index);
                return self.fail(message);
            }
            if frame.timestamp_ns <= last_ts {
                return self.fail(format!(
                    "timestamp {}ns of frame {} is not after {}ns",
                    frame.timestamp_ns, frame.index, last_ts
                ));
            }
        }
        let expected_len = frame.width as usize * frame.height as usize * 3;
        if frame.buffer.len() != expected_len {
            return self.fail(format!(
                "frame {} carries {} bytes, expected {} for {}x{}",
                frame.index,
                frame.buffer.len(),
                expected_len,
                frame.width,
                frame.height
            ));
        }
        self.last_frame = Some((frame.index, frame.timestamp_ns));
        self.frame_format = (frame.width, frame.height, frame.channel_order);
        let first_ts = *self.first_timestamp_ns.get_or_insert(frame.timestamp_ns);

        let mut flags = 0u8;
        if annotation.detected {
            flags |= FLAG_DETECTED;
        }
        if annotation.pose_valid {
            flags |= FLAG_POSE_VALID;
        }
        if self.is_usable(annotation) {
            flags |= FLAG_USABLE;
        }
        let rect = &annotation.rect;
        self.window.push(FrameRecord {
            index: frame.index,
            timestamp_ns: frame.timestamp_ns,
            flags,
            rect: [rect.x as f32, rect.y as f32, rect.w as f32, rect.h as f32],
            valid_points: annotation.valid_point_count().min(u16::MAX as usize) as u16,
        });
        for text in &frame.markers {
            self.window_markers.push(MarkerEntry { frame: frame.index, text: text.clone() });
        }

        // Half a frame of slack absorbs the nanosecond rounding of timestamps
        let covered_ns = (frame.timestamp_ns - first_ts) as f64 + self.frame_ns;
        let boundary_ns = (self.windows_closed as f64 + 1.0) * self.chunk_ns;
        if covered_ns + self.frame_ns / 2.0 < boundary_ns {
            return self.state;
        }

        match self.close_window() {
            Ok(payload) => self.pending = payload,
            Err(message) => return self.fail(message),
        }
        self.windows_closed += 1;
        self.state = if self.windows_closed >= config.number_chunks {
            CollectorState::Completed
        } else {
            CollectorState::ChunkReady
        };
        self.state
    }

    fn retrieve_pending_chunk(&mut self) -> Option<ChunkPayload> {
        self.pending.take()
    }

    fn request_final_flush(&mut self) -> Option<ChunkPayload> {
        if self.flushed {
            crate::utils::logger::warn("final flush requested more than once");
            return None;
        }
        self.flushed = true;

        match self.state {
            CollectorState::Collecting | CollectorState::ChunkReady => {}
            _ => return None,
        }
        match self.close_window() {
            Ok(payload) => {
                self.state = CollectorState::Completed;
                payload
            }
            Err(message) => {
                self.fail(message);
                None
            }
        }
    }

    fn number_chunks(&self) -> u32 {
        self.config.map(|c| c.number_chunks).unwrap_or(0)
    }

    fn chunk_duration_s(&self) -> f64 {
        self.config.map(|c| c.chunk_duration_s).unwrap_or(0.0)
    }

    fn mode(&self) -> &str {
        &self.study.mode
    }

    fn enabled_constraints(&self) -> Vec<String> {
        self.constraints.iter().map(|c| c.name().to_string()).collect()
    }
}
