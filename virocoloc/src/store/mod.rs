//! Analysis records on disk and the batch colocalization report.

mod report;

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use common::BitBuffer2;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::mask::LabelMask;
use crate::overlap::reconcile;
use crate::params::{self, ThresholdParameters};

pub use report::{summarize, write_report, AnalysisReport, ReportRow, REPORT_FILE_NAME};

/// Extension of analysis record files.
pub const RECORD_EXTENSION: &str = "json.gz";

/// Everything needed to recompute colocalization for one image pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub vsv_mask: LabelMask,
    pub delta_mask: LabelMask,
    #[serde(with = "params::as_array")]
    pub thresholds: ThresholdParameters,
}

impl AnalysisRecord {
    fn validate(&self, path: &Path) -> Result<(), PersistenceError> {
        if self.vsv_mask.dimensions() != self.delta_mask.dimensions() {
            return Err(PersistenceError::Invalid {
                path: path.to_path_buf(),
                reason: format!(
                    "VSV mask is {:?} but Delta mask is {:?}",
                    self.vsv_mask.dimensions(),
                    self.delta_mask.dimensions()
                ),
            });
        }
        Ok(())
    }
}

/// Build the record to persist. Delta particles sitting on VSV objects the
/// filter removed are dropped first.
pub fn prepare_record(
    vsv_filtered: &LabelMask,
    removed: &BitBuffer2,
    delta: &LabelMask,
    thresholds: ThresholdParameters,
) -> AnalysisRecord {
    AnalysisRecord {
        vsv_mask: vsv_filtered.clone(),
        delta_mask: reconcile(delta, removed),
        thresholds,
    }
}

/// Record location derived from the Delta source file: `marker` in the
/// file stem becomes `analysis_marker` and the extension becomes
/// [`RECORD_EXTENSION`]. `None` when the stem does not contain `marker`.
pub fn record_path_for(delta_source: &Path, marker: &str, analysis_marker: &str) -> Option<PathBuf> {
    let stem = delta_source.file_stem()?.to_str()?;
    if marker.is_empty() || !stem.contains(marker) {
        return None;
    }
    let name = format!("{}.{RECORD_EXTENSION}", stem.replace(marker, analysis_marker));
    Some(delta_source.with_file_name(name))
}

/// Write `record` as gzip-compressed JSON. The file is written next to its
/// destination and renamed into place once complete.
pub fn save(path: &Path, record: &AnalysisRecord) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;

    let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::default());
    serde_json::to_writer(&mut encoder, record).map_err(|source| PersistenceError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = encoder.finish().map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    drop(writer);

    tmp.persist(path).map_err(|e| io_err(e.error))?;
    tracing::info!(
        path = %path.display(),
        vsv = record.vsv_mask.count_distinct_tags(),
        delta = record.delta_mask.count_distinct_tags(),
        "Saved analysis record"
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<AnalysisRecord, PersistenceError> {
    let file = File::open(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let record: AnalysisRecord =
        serde_json::from_reader(BufReader::new(decoder)).map_err(|source| PersistenceError::Format {
            path: path.to_path_buf(),
            source,
        })?;
    record.validate(path)?;
    tracing::debug!(path = %path.display(), "Loaded analysis record");
    Ok(record)
}
