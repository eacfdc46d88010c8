//! The operator pipeline: one explicit context replacing menu-driven
//! global state.
//!
//! Every public operation is a failure boundary. It either commits its
//! whole result or leaves the session as it was, and failures are logged
//! before being returned. A stage that fails on degenerate input drops its
//! previous output.

mod prompt;


use std::path::PathBuf;

use common::file_utils::TIFF_EXTENSIONS;

use crate::config::AnalysisConfig;
use crate::error::{ComputationError, Error, InputError, PersistenceError, Result};
use crate::geometric_filter::{FilterOutcome, GeometricFilter};
use crate::image::{load_pair, ImageLoader, RawPair};
use crate::mask::LabelMask;
use crate::overlap::{colocalize, Colocalization};
use crate::params::{ThresholdField, ThresholdParameters};
use crate::segmenter::InstanceSegmenter;
use crate::spot_detector::SpotDetector;
use crate::store::{self, AnalysisRecord, REPORT_FILE_NAME};

pub use prompt::{FixedPrompt, LinePrompt, NoPrompt, PathPrompt, StdinPrompt};

pub struct Session {
    config: AnalysisConfig,
    thresholds: ThresholdParameters,
    loader: Box<dyn ImageLoader>,
    segmenter: Box<dyn InstanceSegmenter>,
    prompt: Box<dyn PathPrompt>,
    detector: SpotDetector,

    raw: Option<RawPair>,
    vsv_unfiltered: Option<LabelMask>,
    vsv_filter: Option<FilterOutcome>,
    delta: Option<LabelMask>,
}

impl Session {
    pub fn new(
        config: AnalysisConfig,
        loader: Box<dyn ImageLoader>,
        segmenter: Box<dyn InstanceSegmenter>,
        prompt: Box<dyn PathPrompt>,
    ) -> Self {
        Self {
            thresholds: config.thresholds,
            detector: SpotDetector::new(config.spot.clone()),
            config,
            loader,
            segmenter,
            prompt,
            raw: None,
            vsv_unfiltered: None,
            vsv_filter: None,
            delta: None,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdParameters {
        &self.thresholds
    }

    pub fn raw(&self) -> Option<&RawPair> {
        self.raw.as_ref()
    }

    pub fn vsv_unfiltered(&self) -> Option<&LabelMask> {
        self.vsv_unfiltered.as_ref()
    }

    pub fn vsv_filter(&self) -> Option<&FilterOutcome> {
        self.vsv_filter.as_ref()
    }

    pub fn delta(&self) -> Option<&LabelMask> {
        self.delta.as_ref()
    }

    /// Replace the segmentation backend used by later VSV segmentations.
    pub fn set_segmenter(&mut self, segmenter: Box<dyn InstanceSegmenter>) {
        tracing::info!(backend = segmenter.name(), "Segmentation backend replaced");
        self.segmenter = segmenter;
    }

    /// Load a raw image pair, asking for each path that is not given.
    /// Replaces the current pair and clears every derived mask.
    pub fn load_data(&mut self, vsv: Option<PathBuf>, delta: Option<PathBuf>) -> Result<()> {
        self.boundary("load data", |s| {
            let (vsv, delta) = s.pair_paths(vsv, delta)?;
            let raw = load_pair(s.loader.as_ref(), &vsv, &delta)?;
            s.raw = Some(raw);
            s.vsv_unfiltered = None;
            s.vsv_filter = None;
            s.delta = None;
            Ok(())
        })
    }

    pub fn segment_vsv(&mut self) -> Result<()> {
        self.boundary("segment VSV", |s| {
            let raw = s.require_raw("VSV segmentation")?;
            let labels = s.segmenter.evaluate(&raw.vsv.pixels, &s.config.segmenter)?;
            tracing::info!(
                backend = s.segmenter.name(),
                objects = labels.count_distinct_tags(),
                "Segmented VSV"
            );
            s.vsv_unfiltered = Some(labels);
            s.vsv_filter = None;
            Ok(())
        })
    }

    pub fn filter_vsv(&mut self) -> Result<()> {
        self.boundary("filter VSV", |s| {
            let unfiltered = s
                .vsv_unfiltered
                .as_ref()
                .ok_or(ComputationError::MissingInput {
                    stage: "VSV filtering",
                    missing: "a VSV segmentation",
                })?;
            let outcome = GeometricFilter::new(s.thresholds).apply(unfiltered);
            s.vsv_filter = Some(outcome);
            Ok(())
        })
    }

    pub fn segment_delta(&mut self) -> Result<()> {
        self.boundary("segment Delta", |s| {
            let raw = s.require_raw("Delta detection")?;
            let spots = match s.detector.detect(&raw.delta.pixels) {
                Ok(spots) => spots,
                Err(err) => {
                    s.delta = None;
                    return Err(err.into());
                }
            };
            tracing::info!(spots = spots.count_distinct_tags(), "Detected Delta particles");
            s.delta = Some(spots);
            Ok(())
        })
    }

    /// Update one threshold from operator text. Invalid text keeps the
    /// previous value.
    pub fn set_threshold(&mut self, field: ThresholdField, text: &str) -> Result<f64> {
        self.boundary("set threshold", |s| {
            let value = s.thresholds.set_from_text(field, text)?;
            tracing::info!(%field, value, "Threshold updated");
            Ok(value)
        })
    }

    /// Colocalization of the current filtered VSV and Delta masks, after
    /// dropping Delta particles on removed VSV objects.
    pub fn colocalization(&mut self) -> Result<Colocalization> {
        self.boundary("colocalization", |s| {
            let record = s.current_record("colocalization")?;
            Ok(colocalize(
                &record.delta_mask,
                &record.vsv_mask,
                s.config.expansion_distance,
            ))
        })
    }

    /// Persist the current analysis next to the Delta source, or where the
    /// operator chooses when the name carries no channel marker.
    pub fn save_analysis(&mut self) -> Result<PathBuf> {
        self.boundary("save analysis", |s| {
            let record = s.current_record("saving")?;
            let delta_path = s.require_raw("saving")?.delta.path.clone();
            let path = match store::record_path_for(
                &delta_path,
                &s.config.channel_marker,
                &s.config.analysis_marker,
            ) {
                Some(path) => path,
                None => s
                    .prompt
                    .choose_path("Save analysis as", store::RECORD_EXTENSION)
                    .ok_or(PersistenceError::Cancelled {
                        purpose: "the analysis record",
                    })?,
            };
            store::save(&path, &record)?;
            Ok(path)
        })
    }

    /// Reload a pair together with the thresholds stored in its analysis
    /// record, then recompute every stage with them.
    pub fn load_analysis(&mut self, vsv: Option<PathBuf>, delta: Option<PathBuf>) -> Result<()> {
        self.boundary("load analysis", |s| {
            let (vsv, delta) = s.pair_paths(vsv, delta)?;
            let record_path = match store::record_path_for(
                &delta,
                &s.config.channel_marker,
                &s.config.analysis_marker,
            ) {
                Some(path) => path,
                None => s
                    .prompt
                    .choose_path("Open analysis record", store::RECORD_EXTENSION)
                    .ok_or(InputError::Cancelled {
                        purpose: "the analysis record",
                    })?,
            };
            let record = store::load(&record_path)?;
            let raw = load_pair(s.loader.as_ref(), &vsv, &delta)?;
            if raw.vsv.dimensions() != record.vsv_mask.dimensions() {
                return Err(InputError::ShapeMismatch {
                    what: "stored analysis",
                    expected: raw.vsv.dimensions(),
                    actual: record.vsv_mask.dimensions(),
                }
                .into());
            }

            let vsv_unfiltered = s.segmenter.evaluate(&raw.vsv.pixels, &s.config.segmenter)?;
            let outcome = GeometricFilter::new(record.thresholds).apply(&vsv_unfiltered);
            let spots = s.detector.detect(&raw.delta.pixels)?;

            tracing::info!(
                path = %record_path.display(),
                thresholds = %record.thresholds,
                "Restored analysis"
            );
            s.thresholds = record.thresholds;
            s.raw = Some(raw);
            s.vsv_unfiltered = Some(vsv_unfiltered);
            s.vsv_filter = Some(outcome);
            s.delta = Some(spots);
            Ok(())
        })
    }

    /// Write the colocalization report for every record in `dir` (asked
    /// for when not given). Returns the report path.
    pub fn summarize(&mut self, dir: Option<PathBuf>) -> Result<PathBuf> {
        self.boundary("summarize", |s| {
            let dir = match dir {
                Some(dir) => dir,
                None => s
                    .prompt
                    .choose_path("Folder with analysis records", "")
                    .ok_or(InputError::Cancelled {
                        purpose: "the records folder",
                    })?,
            };
            let report = store::summarize(&dir, s.config.expansion_distance)?;
            let path = dir.join(REPORT_FILE_NAME);
            store::write_report(&report, &path)?;
            Ok(path)
        })
    }

    fn current_record(&self, stage: &'static str) -> Result<AnalysisRecord> {
        let filter = self.vsv_filter.as_ref().ok_or(ComputationError::MissingInput {
            stage,
            missing: "a filtered VSV mask",
        })?;
        let delta = self.delta.as_ref().ok_or(ComputationError::MissingInput {
            stage,
            missing: "a Delta detection",
        })?;
        if filter.filtered.dimensions() != delta.dimensions() {
            return Err(ComputationError::ShapeMismatch {
                stage,
                what: "Delta mask",
                expected: filter.filtered.dimensions(),
                actual: delta.dimensions(),
            }
            .into());
        }
        Ok(store::prepare_record(
            &filter.filtered,
            &filter.removed,
            delta,
            self.thresholds,
        ))
    }

    fn require_raw(&self, stage: &'static str) -> Result<&RawPair, ComputationError> {
        self.raw.as_ref().ok_or(ComputationError::MissingInput {
            stage,
            missing: "a loaded image pair",
        })
    }

    fn pair_paths(&mut self, vsv: Option<PathBuf>, delta: Option<PathBuf>) -> Result<(PathBuf, PathBuf)> {
        let filter = TIFF_EXTENSIONS.join(",");
        let vsv = match vsv {
            Some(path) => path,
            None => self
                .prompt
                .choose_path("VSV image", &filter)
                .ok_or(InputError::Cancelled { purpose: "the VSV image" })?,
        };
        let delta = match delta {
            Some(path) => path,
            None => self
                .prompt
                .choose_path("Delta image", &filter)
                .ok_or(InputError::Cancelled { purpose: "the Delta image" })?,
        };
        Ok((vsv, delta))
    }

    /// Run `op`, logging its error. State changes happen only at the end of
    /// each operation, after everything that can fail.
    fn boundary<T>(&mut self, stage: &'static str, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        if let Err(err) = &result {
            match err {
                Error::Parameter(_) => tracing::warn!(stage, error = %err, "Rejected input"),
                _ => tracing::error!(stage, error = %err, "Stage failed"),
            }
        }
        result
    }
}
