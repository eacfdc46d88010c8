//! Delta particle detection: band-pass filtering, global threshold and
//! component cleanup.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ComputationError;
use crate::filters::{gaussian_blur, laplace, otsu_threshold};
use crate::image::RawImage;
use crate::mask::{label, remove_small_objects, remove_tags, Connectivity, LabelMask, RegionProperties};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotDetectorConfig {
    /// Gaussian smoothing applied before the Laplacian.
    pub sigma: f32,
    /// Components with fewer pixels are discarded.
    pub min_size: usize,
    /// Components whose mean raw intensity is below this are discarded.
    pub min_mean_intensity: f64,
    pub connectivity: Connectivity,
}

impl Default for SpotDetectorConfig {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            min_size: 4,
            min_mean_intensity: 40.0,
            connectivity: Connectivity::Eight,
        }
    }
}

impl SpotDetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(format!("spot.sigma must be positive, got {}", self.sigma));
        }
        if !self.min_mean_intensity.is_finite() {
            return Err("spot.min_mean_intensity must be finite".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpotDetector {
    config: SpotDetectorConfig,
}

impl SpotDetector {
    pub fn new(config: SpotDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpotDetectorConfig {
        &self.config
    }

    /// Detect bright spots and return them as labeled components.
    pub fn detect(&self, image: &RawImage) -> Result<LabelMask, ComputationError> {
        if image.is_empty() {
            return Err(ComputationError::EmptyImage {
                stage: "spot detection",
            });
        }
        let (width, height) = image.dimensions();
        let config = &self.config;

        let filtered = laplace(&gaussian_blur(image, config.sigma));
        let Some(threshold) = otsu_threshold(filtered.pixels()) else {
            tracing::warn!("Filtered Delta image is uniform, no spots detected");
            return Ok(LabelMask::zeros(width, height));
        };

        let mut binary = common::BitBuffer2::from_fn(width, height, |x, y| {
            *filtered.get(x, y) > threshold
        });
        binary.clear_border();

        let components = label(&binary, config.connectivity);
        let large = remove_small_objects(&components, config.min_size);
        let spots = label(&large.binary(), config.connectivity);

        let props = RegionProperties::compute(&spots, Some(image));
        let mut dim = BTreeSet::new();
        let mut lines = BTreeSet::new();
        for region in &props {
            if region
                .mean_intensity
                .is_some_and(|mean| mean < config.min_mean_intensity)
            {
                dim.insert(region.tag);
            } else if region.is_line() {
                lines.insert(region.tag);
            }
        }

        tracing::debug!(
            threshold,
            candidates = components.count_distinct_tags(),
            after_size = props.len(),
            dim = dim.len(),
            lines = lines.len(),
            "Spot detection"
        );

        let rejected: BTreeSet<u32> = dim.union(&lines).copied().collect();
        Ok(remove_tags(&spots, &rejected))
    }
}
