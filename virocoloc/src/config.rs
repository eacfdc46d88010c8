//! Analysis configuration, loadable from YAML or JSON.

use std::path::{Path, PathBuf};

use common::file_format::{self, FileExtensionError};
use common::{FileFormat, SerdeFormatError};
use serde::{Deserialize, Serialize};

use crate::overlap::DEFAULT_EXPANSION_DISTANCE;
use crate::params::ThresholdParameters;
use crate::segmenter::SegmenterConfig;
use crate::spot_detector::SpotDetectorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] FileExtensionError),

    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SerdeFormatError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub spot: SpotDetectorConfig,
    pub segmenter: SegmenterConfig,
    pub thresholds: ThresholdParameters,
    /// Radius Delta centroids are grown by before measuring overlap.
    pub expansion_distance: f64,
    /// Substring of the Delta file name identifying its channel.
    pub channel_marker: String,
    /// Replacement for `channel_marker` in analysis record names.
    pub analysis_marker: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spot: SpotDetectorConfig::default(),
            segmenter: SegmenterConfig::default(),
            thresholds: ThresholdParameters::default(),
            expansion_distance: DEFAULT_EXPANSION_DISTANCE,
            channel_marker: "RED".to_string(),
            analysis_marker: "ANALYSIS".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = file_format::deserialize(&text, format).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spot.validate().map_err(ConfigError::Invalid)?;
        self.segmenter.validate().map_err(ConfigError::Invalid)?;
        self.thresholds
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(self.expansion_distance.is_finite() && self.expansion_distance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "expansion_distance must be non-negative, got {}",
                self.expansion_distance
            )));
        }
        if self.channel_marker.is_empty() {
            return Err(ConfigError::Invalid("channel_marker must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Connectivity;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expansion_distance, 2.0);
        assert_eq!(config.channel_marker, "RED");
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.yaml");
        std::fs::write(
            &path,
            "thresholds:\n  thickness: 20\n  area: 120\nspot:\n  connectivity: four\n",
        )
        .unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.thresholds.thickness, 20.0);
        assert_eq!(config.thresholds.area, 120.0);
        assert_eq!(config.thresholds.upper_ratio, 5.0);
        assert_eq!(config.spot.connectivity, Connectivity::Four);
        assert_eq!(config.spot.sigma, 1.5);
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        std::fs::write(&path, r#"{"expansion_distance": 3.0, "segmenter": {"diameter": 20}}"#).unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.expansion_distance, 3.0);
        assert_eq!(config.segmenter.diameter, 20.0);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.yml");
        std::fs::write(&path, "thresholds:\n  lower_ratio: 0\n").unwrap();
        assert!(matches!(AnalysisConfig::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(AnalysisConfig::load(&path), Err(ConfigError::Format(_))));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = AnalysisConfig::default();
        let yaml = file_format::serialize(&config, FileFormat::Yaml).unwrap();
        let back: AnalysisConfig = file_format::deserialize(&yaml, FileFormat::Yaml).unwrap();
        assert_eq!(back, config);
    }
}
