//! Per-frame face annotations supplied from outside the pipeline.

pub mod face_file;

use std::collections::BTreeMap;

use crate::error::Result;

pub use face_file::FaceDataset;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosePoint {
    pub x: f64,
    pub y: f64,
    pub valid: bool,
    pub estimated: bool,
    pub quality: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub face_id: String,
    pub rect: Rect,
    pub pose_valid: bool,
    pub detected: bool,
    pub points: BTreeMap<String, PosePoint>,
}

impl Annotation {
    pub fn valid_point_count(&self) -> usize {
        self.points.values().filter(|p| p.valid).count()
    }
}

/// Read-only lookup of the annotation for a frame index.
pub trait AnnotationProvider {
    /// Fails with `ChunkError::AnnotationMissing` when the index has no entry.
    fn lookup(&self, frame_index: u64) -> Result<&Annotation>;
}

#[cfg(test)]
impl Annotation {
    /// A single tracked face with three landmarks.
    pub fn sample(detected: bool) -> Self {
        let mut points = BTreeMap::new();
        for (i, id) in ["5", "12", "33"].iter().enumerate() {
            points.insert(
                id.to_string(),
                PosePoint {
                    x: 10.0 * i as f64,
                    y: 5.0,
                    valid: detected,
                    estimated: false,
                    quality: 0.8,
                },
            );
        }
        Self {
            face_id: "face-0".into(),
            rect: Rect { x: 100.0, y: 80.0, w: 220.0, h: 260.0 },
            pose_valid: detected,
            detected,
            points,
        }
    }
}
