use crate::shared::constants::NANOS_PER_SECOND;

/// Byte order of the three colour channels in `Frame::buffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Bgr,
}

/// One decoded video frame
#[derive(Clone)]
pub struct Frame {
    pub index: u64,
    pub timestamp_ns: i64,
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channel_order: ChannelOrder,
    pub markers: Vec<String>,
}

impl Frame {
    /// Build a frame whose timestamp is derived from its index and the frame rate.
    pub fn new(
        index: u64,
        fps: f64,
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        channel_order: ChannelOrder,
    ) -> Self {
        Self {
            index,
            timestamp_ns: timestamp_ns(index, fps),
            buffer,
            width,
            height,
            channel_order,
            markers: Vec::new(),
        }
    }

    pub fn add_marker(&mut self, text: impl Into<String>) {
        self.markers.push(text.into());
    }
}

pub fn frame_duration_ns(fps: f64) -> f64 {
    NANOS_PER_SECOND / fps
}

/// `index * (1e9 / fps)`, rounded to the nearest nanosecond.
pub fn timestamp_ns(index: u64, fps: f64) -> i64 {
    (index as f64 * frame_duration_ns(fps)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_step_by_one_frame() {
        for fps in [24.0, 25.0, 29.97, 30.0, 60.0] {
            let step = frame_duration_ns(fps);
            for i in 0..1000u64 {
                let delta = (timestamp_ns(i + 1, fps) - timestamp_ns(i, fps)) as f64;
                assert!((delta - step).abs() <= 1.0, "fps={} i={} delta={}", fps, i, delta);
            }
        }
    }

    #[test]
    fn test_timestamp_at_30fps() {
        assert_eq!(timestamp_ns(0, 30.0), 0);
        assert_eq!(timestamp_ns(30, 30.0), 1_000_000_000);
        assert_eq!(timestamp_ns(1, 30.0), 33_333_333);
    }
}
