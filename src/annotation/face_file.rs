use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use super::{Annotation, AnnotationProvider, PosePoint, Rect};
use crate::error::{ChunkError, Result};

#[derive(Deserialize)]
struct FaceFile {
    frames: HashMap<String, FaceRecord>,
}

#[derive(Deserialize)]
struct FaceRecord {
    id: String,
    #[serde(rename = "rect.x")]
    x: f64,
    #[serde(rename = "rect.y")]
    y: f64,
    #[serde(rename = "rect.w")]
    w: f64,
    #[serde(rename = "rect.h")]
    h: f64,
    #[serde(rename = "poseValid")]
    pose_valid: bool,
    detected: bool,
    #[serde(default)]
    points: BTreeMap<String, PointRecord>,
}

#[derive(Deserialize)]
struct PointRecord {
    x: f64,
    y: f64,
    valid: bool,
    estimated: bool,
    quality: f64,
}

impl From<FaceRecord> for Annotation {
    fn from(record: FaceRecord) -> Self {
        Annotation {
            face_id: record.id,
            rect: Rect { x: record.x, y: record.y, w: record.w, h: record.h },
            pose_valid: record.pose_valid,
            detected: record.detected,
            points: record
                .points
                .into_iter()
                .map(|(id, p)| {
                    let point = PosePoint {
                        x: p.x,
                        y: p.y,
                        valid: p.valid,
                        estimated: p.estimated,
                        quality: p.quality,
                    };
                    (id, point)
                })
                .collect(),
        }
    }
}

/// Face tracking results saved by an earlier tracker run, keyed by frame index.
#[derive(Debug, Default)]
pub struct FaceDataset {
    frames: HashMap<u64, Annotation>,
}

impl FaceDataset {
    pub fn load(path: &Path) -> Result<Self> {
        let data = crate::utils::file_utils::read_file(path)
            .map_err(|e| ChunkError::AnnotationLoadFailed(format!("{:#}", e)))?;
        let dataset = Self::from_json(&data)
            .map_err(|e| ChunkError::AnnotationLoadFailed(format!("{}: {}", path.display(), e)))?;
        crate::utils::logger::info(&format!(
            "Loaded {} face annotations from {}",
            dataset.len(),
            path.display()
        ));
        Ok(dataset)
    }

    pub fn from_json(data: &[u8]) -> std::result::Result<Self, String> {
        let file: FaceFile = serde_json::from_slice(data).map_err(|e| e.to_string())?;
        let mut frames = HashMap::with_capacity(file.frames.len());
        for (key, record) in file.frames {
            let index = key
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("frame key {:?} is not a frame index", key))?;
            frames.insert(index, Annotation::from(record));
        }
        Ok(Self { frames })
    }

    #[cfg(test)]
    pub fn from_annotations(frames: HashMap<u64, Annotation>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl AnnotationProvider for FaceDataset {
    fn lookup(&self, frame_index: u64) -> Result<&Annotation> {
        self.frames
            .get(&frame_index)
            .ok_or(ChunkError::AnnotationMissing { frame: frame_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "frames": {
            "1": {
                "id": "face-0",
                "rect.x": 10, "rect.y": 20, "rect.w": 100, "rect.h": 120,
                "poseValid": true,
                "detected": true,
                "points": {
                    "5": {"x": 1.5, "y": 2.5, "valid": true, "estimated": false, "quality": 0.9},
                    "12": {"x": 3.0, "y": 4.0, "valid": false, "estimated": true, "quality": 0.1}
                }
            },
            "2": {
                "id": "face-0",
                "rect.x": 11, "rect.y": 21, "rect.w": 100, "rect.h": 120,
                "poseValid": false,
                "detected": false,
                "points": {}
            }
        }
    }"#;

    #[test]
    fn test_parse_face_file() {
        let dataset = FaceDataset::from_json(SAMPLE.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = dataset.lookup(1).unwrap();
        assert_eq!(first.face_id, "face-0");
        assert_eq!(first.rect, Rect { x: 10.0, y: 20.0, w: 100.0, h: 120.0 });
        assert!(first.pose_valid && first.detected);
        assert_eq!(first.points.len(), 2);
        assert_eq!(first.valid_point_count(), 1);
        assert!(first.points["12"].estimated);

        assert!(!dataset.lookup(2).unwrap().detected);
    }

    #[test]
    fn test_missing_frame_is_reported_with_index() {
        let dataset = FaceDataset::from_json(SAMPLE.as_bytes()).unwrap();
        match dataset.lookup(42) {
            Err(ChunkError::AnnotationMissing { frame }) => assert_eq!(frame, 42),
            other => panic!("unexpected lookup result: {:?}", other.map(|a| a.face_id.clone())),
        }
    }

    #[test]
    fn test_non_numeric_key_rejected() {
        let bad = r#"{"frames": {"first": {"id": "f",
            "rect.x": 0, "rect.y": 0, "rect.w": 0, "rect.h": 0,
            "poseValid": false, "detected": false, "points": {}}}}"#;
        let err = FaceDataset::from_json(bad.as_bytes()).unwrap_err();
        assert!(err.contains("first"));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("vchunk_no_such_faces.json");
        match FaceDataset::load(&path) {
            Err(ChunkError::AnnotationLoadFailed(_)) => {}
            _ => panic!("expected AnnotationLoadFailed"),
        }
    }
}
