use std::io::Write;
use std::path::Path;

use chrono::{Local, NaiveDate};
use common::file_utils::{file_stem_without, files_with_suffix};
use rayon::prelude::*;

use super::{load, RECORD_EXTENSION};
use crate::error::PersistenceError;
use crate::overlap::{colocalize, Colocalization};

/// Default report file name inside the analysed folder.
pub const REPORT_FILE_NAME: &str = "ColocRecap_Journal.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Record file name without its extension.
    pub identifier: String,
    pub colocalization: Colocalization,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub rows: Vec<ReportRow>,
    pub software_version: String,
    pub date: NaiveDate,
}

impl AnalysisReport {
    /// Write the three report sections as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);

        csv.write_record(["Delta on VSV"])?;
        csv.write_record(["File", "Coloc Raw", "Number of Delta"])?;
        for row in &self.rows {
            csv.write_record([
                row.identifier.clone(),
                row.colocalization.delta_on_vsv.to_string(),
                row.colocalization.delta_count.to_string(),
            ])?;
        }
        csv.write_record([""])?;

        csv.write_record(["VSV on Delta"])?;
        csv.write_record(["File", "Coloc Raw", "Number of VSV"])?;
        for row in &self.rows {
            csv.write_record([
                row.identifier.clone(),
                row.colocalization.vsv_on_delta.to_string(),
                row.colocalization.vsv_count.to_string(),
            ])?;
        }
        csv.write_record([""])?;

        csv.write_record(["Info"])?;
        csv.write_record(["Software Version", self.software_version.as_str()])?;
        csv.write_record(["date".to_string(), self.date.format("%d%b%y").to_string()])?;
        csv.flush()?;
        Ok(())
    }
}

/// Colocalization of every analysis record in `dir`, in natural file name
/// order. Any unreadable record aborts the report.
pub fn summarize(dir: &Path, expansion_distance: f64) -> Result<AnalysisReport, PersistenceError> {
    let records = files_with_suffix(dir, RECORD_EXTENSION).map_err(|source| PersistenceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!(dir = %dir.display(), records = records.len(), "Summarizing analysis records");

    let rows = records
        .par_iter()
        .map(|path| {
            let record = load(path)?;
            Ok(ReportRow {
                identifier: record_identifier(path),
                colocalization: colocalize(&record.delta_mask, &record.vsv_mask, expansion_distance),
            })
        })
        .collect::<Result<Vec<_>, PersistenceError>>()?;

    Ok(AnalysisReport {
        rows,
        software_version: software_version(),
        date: Local::now().date_naive(),
    })
}

/// Write `report` to `path` as CSV.
pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<(), PersistenceError> {
    let file = std::fs::File::create(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    report
        .write_csv(std::io::BufWriter::new(file))
        .map_err(|source| PersistenceError::Report {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), rows = report.rows.len(), "Wrote colocalization report");
    Ok(())
}

fn record_identifier(path: &Path) -> String {
    file_stem_without(path, RECORD_EXTENSION).unwrap_or_else(|| path.display().to_string())
}

fn software_version() -> String {
    format!("{}_v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
