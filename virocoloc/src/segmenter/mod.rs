//! VSV instance segmentation behind a swappable backend.
//!
//! The learned model itself lives outside this crate. A backend only has
//! to turn an image into an instance label map of the same shape.


use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::SegmentationError;
use crate::image::{read_label_tiff, write_float_tiff, RawImage};
use crate::mask::LabelMask;

/// Model inference parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Expected object diameter in pixels.
    pub diameter: f64,
    pub flow_threshold: f64,
    pub cellprob_threshold: f64,
    /// Only meaningful for stacks; 0 for 2D images.
    pub stitch_threshold: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            diameter: 13.0,
            flow_threshold: 1.0,
            cellprob_threshold: 0.0,
            stitch_threshold: 0.0,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.diameter.is_finite() && self.diameter > 0.0) {
            return Err(format!("segmenter.diameter must be positive, got {}", self.diameter));
        }
        for (name, value) in [
            ("flow_threshold", self.flow_threshold),
            ("cellprob_threshold", self.cellprob_threshold),
            ("stitch_threshold", self.stitch_threshold),
        ] {
            if !value.is_finite() {
                return Err(format!("segmenter.{name} must be finite"));
            }
        }
        Ok(())
    }
}

/// Produces an instance label map for an image.
pub trait InstanceSegmenter {
    fn name(&self) -> &str;

    fn evaluate(&self, image: &RawImage, config: &SegmenterConfig) -> Result<LabelMask, SegmentationError>;
}

fn check_shape(image: &RawImage, labels: &LabelMask) -> Result<(), SegmentationError> {
    if labels.dimensions() != image.dimensions() {
        return Err(SegmentationError::ShapeMismatch {
            expected: image.dimensions(),
            actual: labels.dimensions(),
        });
    }
    Ok(())
}

/// Reads a label map the model produced ahead of time.
#[derive(Debug, Clone)]
pub struct LabelFileSegmenter {
    path: PathBuf,
}

impl LabelFileSegmenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstanceSegmenter for LabelFileSegmenter {
    fn name(&self) -> &str {
        "label-file"
    }

    fn evaluate(&self, image: &RawImage, _config: &SegmenterConfig) -> Result<LabelMask, SegmentationError> {
        let labels = read_label_tiff(&self.path)?;
        check_shape(image, &labels)?;
        tracing::info!(
            path = %self.path.display(),
            objects = labels.count_distinct_tags(),
            "Loaded VSV label map"
        );
        Ok(labels)
    }
}

/// Runs an external inference program.
///
/// The program is called as
/// `<program> [args..] --input <tif> --output <tif> --diameter <d>
/// --flow-threshold <f> --cellprob-threshold <c> --stitch-threshold <s>`
/// and must write a 16 or 32-bit label TIFF to the output path.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
}

impl CommandSegmenter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl InstanceSegmenter for CommandSegmenter {
    fn name(&self) -> &str {
        &self.program
    }

    fn evaluate(&self, image: &RawImage, config: &SegmenterConfig) -> Result<LabelMask, SegmentationError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.tif");
        let output = workdir.path().join("labels.tif");
        write_float_tiff(&input, image)?;

        tracing::info!(program = %self.program, diameter = config.diameter, "Running segmentation");
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg("--input")
            .arg(&input)
            .arg("--output")
            .arg(&output)
            .arg("--diameter")
            .arg(config.diameter.to_string())
            .arg("--flow-threshold")
            .arg(config.flow_threshold.to_string())
            .arg("--cellprob-threshold")
            .arg(config.cellprob_threshold.to_string())
            .arg("--stitch-threshold")
            .arg(config.stitch_threshold.to_string())
            .output()
            .map_err(|source| SegmentationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(SegmentationError::CommandFailed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let labels = read_label_tiff(&output)?;
        check_shape(image, &labels)?;
        Ok(labels)
    }
}
