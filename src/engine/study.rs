use std::path::Path;

use serde::Deserialize;

use super::collector::SegmentingCollector;
use crate::error::{ChunkError, Result};
use crate::shared::constants;

/// Engine configuration bundle loaded from the study file.
#[derive(Debug, Clone, Deserialize)]
pub struct Study {
    pub name: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default = "default_min_usable_ratio")]
    pub min_usable_ratio: f64,
    #[serde(default)]
    pub max_chunk_duration_s: Option<f64>,
}

fn default_mode() -> String {
    "streaming".into()
}

fn default_min_usable_ratio() -> f64 {
    constants::DEFAULT_MIN_USABLE_RATIO
}

impl Study {
    pub fn from_json(data: &[u8]) -> std::result::Result<Self, String> {
        let study: Study = serde_json::from_slice(data).map_err(|e| e.to_string())?;
        study.validate()?;
        Ok(study)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("study name is empty".into());
        }
        if !(0.0..=1.0).contains(&self.min_usable_ratio) {
            return Err(format!("min_usable_ratio {} outside [0, 1]", self.min_usable_ratio));
        }
        if let Some(max) = self.max_chunk_duration_s {
            if !(max.is_finite() && max > 0.0) {
                return Err(format!("max_chunk_duration_s {} must be positive", max));
            }
        }
        Ok(())
    }
}

/// Entry point to the engine: owns the study and builds collectors from it.
pub struct Factory {
    study: Study,
}

impl Factory {
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn initialize_study_from_file(path: &Path) -> Result<Self> {
        let data = crate::utils::file_utils::read_file(path)
            .map_err(|e| ChunkError::EngineInitializationFailed(format!("{:#}", e)))?;
        let study = Study::from_json(&data).map_err(|e| {
            ChunkError::EngineInitializationFailed(format!("{}: {}", path.display(), e))
        })?;
        let message = format!("Study '{}' loaded from {}", study.name, path.display());
        crate::utils::logger::info(&message);
        Ok(Self::from_study(study))
    }

    pub fn from_study(study: Study) -> Self {
        Self { study }
    }

    pub fn mode(&self) -> &str {
        &self.study.mode
    }

    pub fn create_collector(&self) -> SegmentingCollector {
        SegmentingCollector::new(self.study.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CollectorState, ExtractionEngine};

    #[test]
    fn test_minimal_study_defaults() {
        let study = Study::from_json(br#"{"name": "demo"}"#).unwrap();
        assert_eq!(study.mode, "streaming");
        assert!(study.constraints.is_empty());
        assert_eq!(study.min_usable_ratio, constants::DEFAULT_MIN_USABLE_RATIO);
        assert!(study.max_chunk_duration_s.is_none());
    }

    #[test]
    fn test_study_rejects_bad_ratio() {
        let err = Study::from_json(br#"{"name": "demo", "min_usable_ratio": 1.5}"#).unwrap_err();
        assert!(err.contains("min_usable_ratio"));
    }

    #[test]
    fn test_missing_study_file_fails_initialization() {
        let path = std::env::temp_dir().join("vchunk_missing_study.json");
        match Factory::initialize_study_from_file(&path) {
            Err(ChunkError::EngineInitializationFailed(_)) => {}
            _ => panic!("expected EngineInitializationFailed"),
        }
    }

    #[test]
    fn test_study_file_round_trip_to_collector() {
        let dir = std::env::temp_dir().join("vchunk_study_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("study.json");
        let body = r#"{"name": "demo", "mode": "discrete", "constraints": ["pose_valid"]}"#;
        std::fs::write(&path, body).unwrap();

        let factory = Factory::initialize_study_from_file(&path).unwrap();
        assert_eq!(factory.mode(), "discrete");
        let collector = factory.create_collector();
        assert_eq!(collector.state(), CollectorState::Uninitialized);
        assert_eq!(collector.enabled_constraints(), vec!["pose_valid".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_constraint_fails_collector_creation() {
        let body = br#"{"name": "demo", "constraints": ["heart_visible"]}"#;
        let study = Study::from_json(body).unwrap();
        let collector = Factory::from_study(study).create_collector();
        assert_eq!(collector.state(), CollectorState::Error);
        assert!(collector.last_error().unwrap().contains("heart_visible"));
    }
}
