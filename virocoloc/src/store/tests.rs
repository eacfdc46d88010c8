use std::io::Write as _;

use chrono::NaiveDate;

use super::*;
use crate::overlap::Colocalization;
use crate::testing::{fill_ellipse, fill_rect};

fn sample_record() -> AnalysisRecord {
    let mut vsv = LabelMask::zeros(40, 30);
    fill_ellipse(&mut vsv, 10.0, 10.0, 5.0, 4.0, 3);
    fill_ellipse(&mut vsv, 30.0, 20.0, 5.0, 4.0, 8);
    let mut delta = LabelMask::zeros(40, 30);
    fill_rect(&mut delta, 9, 9, 11, 11, 1);
    fill_rect(&mut delta, 2, 25, 4, 27, 2);
    AnalysisRecord {
        vsv_mask: vsv,
        delta_mask: delta,
        thresholds: ThresholdParameters {
            thickness: 17.5,
            upper_ratio: 4.0,
            lower_ratio: 1.2,
            area: 140.0,
        },
    }
}

fn write_gz_json(path: &Path, json: &str) {
    let file = File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(json.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("img_ANALYSIS.json.gz");
    let record = sample_record();

    save(&path, &record).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded.vsv_mask, record.vsv_mask);
    assert_eq!(loaded.delta_mask, record.delta_mask);
    assert_eq!(loaded.thresholds, record.thresholds);
}

#[test]
fn test_save_overwrites_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("img_ANALYSIS.json.gz");
    save(&path, &sample_record()).unwrap();

    let mut second = sample_record();
    second.thresholds.area = 99.0;
    save(&path, &second).unwrap();

    assert_eq!(load(&path).unwrap().thresholds.area, 99.0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_record_field_order() {
    let json = serde_json::to_string(&sample_record()).unwrap();
    let vsv = json.find("\"vsv_mask\"").unwrap();
    let delta = json.find("\"delta_mask\"").unwrap();
    let thresholds = json.find("\"thresholds\":[17.5,4.0,1.2,140.0]").unwrap();
    assert!(vsv < delta && delta < thresholds);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("absent.json.gz")).unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
}

#[test]
fn test_load_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json.gz");
    std::fs::write(&path, b"definitely not gzip").unwrap();
    assert!(matches!(load(&path).unwrap_err(), PersistenceError::Format { .. }));
}

#[test]
fn test_load_rejects_non_positive_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json.gz");
    let mask = r#"{"width":1,"height":1,"pixels":[0]}"#;
    write_gz_json(
        &path,
        &format!(r#"{{"vsv_mask":{mask},"delta_mask":{mask},"thresholds":[18,5,-1,150]}}"#),
    );
    assert!(matches!(load(&path).unwrap_err(), PersistenceError::Format { .. }));
}

#[test]
fn test_load_rejects_mismatched_masks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json.gz");
    write_gz_json(
        &path,
        r#"{"vsv_mask":{"width":2,"height":1,"pixels":[0,1]},
            "delta_mask":{"width":1,"height":1,"pixels":[0]},
            "thresholds":[18,5,1.1,150]}"#,
    );
    assert!(matches!(load(&path).unwrap_err(), PersistenceError::Invalid { .. }));
}

#[test]
fn test_load_rejects_truncated_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json.gz");
    write_gz_json(
        &path,
        r#"{"vsv_mask":{"width":2,"height":2,"pixels":[0,1]},
            "delta_mask":{"width":2,"height":2,"pixels":[0,0,0,0]},
            "thresholds":[18,5,1.1,150]}"#,
    );
    assert!(matches!(load(&path).unwrap_err(), PersistenceError::Format { .. }));
}

#[test]
fn test_record_path_for() {
    assert_eq!(
        record_path_for(Path::new("/data/cell3_RED.tif"), "RED", "ANALYSIS"),
        Some(PathBuf::from("/data/cell3_ANALYSIS.json.gz"))
    );
    assert_eq!(record_path_for(Path::new("/data/cell3_GREEN.tif"), "RED", "ANALYSIS"), None);
    assert_eq!(record_path_for(Path::new("/data/cell3_RED.tif"), "", "ANALYSIS"), None);
}

#[test]
fn test_prepare_record_reconciles_delta() {
    let record = sample_record();
    // Pretend the VSV object around tag 1 of Delta was rejected.
    let removed = BitBuffer2::from_fn(40, 30, |x, y| x == 12 && y == 12);
    let prepared = prepare_record(&record.vsv_mask, &removed, &record.delta_mask, record.thresholds);
    assert_eq!(prepared.delta_mask.tags(), vec![2]);
    assert_eq!(prepared.vsv_mask, record.vsv_mask);
}

#[test]
fn test_summarize_natural_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["img10", "img2", "img1"] {
        save(&dir.path().join(format!("{name}.json.gz")), &sample_record()).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let report = summarize(dir.path(), 2.0).unwrap();
    let ids: Vec<_> = report.rows.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["img1", "img2", "img10"]);

    let coloc = report.rows[0].colocalization;
    assert_eq!(coloc.delta_count, 2);
    assert_eq!(coloc.vsv_count, 2);
    assert_eq!(coloc.delta_on_vsv, 50.0);
    assert_eq!(coloc.vsv_on_delta, 50.0);
    assert!(report.software_version.starts_with("virocoloc_v"));
}

#[test]
fn test_summarize_aborts_on_bad_record() {
    let dir = tempfile::tempdir().unwrap();
    save(&dir.path().join("a1.json.gz"), &sample_record()).unwrap();
    std::fs::write(dir.path().join("a2.json.gz"), b"broken").unwrap();
    let err = summarize(dir.path(), 2.0).unwrap_err();
    match err {
        PersistenceError::Format { path, .. } => assert!(path.ends_with("a2.json.gz")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_summarize_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        summarize(&dir.path().join("nope"), 2.0).unwrap_err(),
        PersistenceError::Io { .. }
    ));
}

#[test]
fn test_report_csv_layout() {
    let report = AnalysisReport {
        rows: vec![ReportRow {
            identifier: "img1".to_string(),
            colocalization: Colocalization {
                delta_on_vsv: 100.0 / 3.0,
                vsv_on_delta: 50.0,
                delta_count: 3,
                vsv_count: 2,
            },
        }],
        software_version: "virocoloc_v1.0.0".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    };

    let mut out = Vec::new();
    report.write_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();

    assert_eq!(
        lines,
        vec![
            "Delta on VSV",
            "File,Coloc Raw,Number of Delta",
            "img1,33.333333333333336,3",
            "\"\"",
            "VSV on Delta",
            "File,Coloc Raw,Number of VSV",
            "img1,50,2",
            "\"\"",
            "Info",
            "Software Version,virocoloc_v1.0.0",
            "date,19Oct26",
        ]
    );
}

#[test]
fn test_write_report_to_file() {
    let dir = tempfile::tempdir().unwrap();
    save(&dir.path().join("img1.json.gz"), &sample_record()).unwrap();
    let report = summarize(dir.path(), 2.0).unwrap();
    let path = dir.path().join(REPORT_FILE_NAME);
    write_report(&report, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Delta on VSV"));
    assert!(text.contains("img1,50,2"));
}
