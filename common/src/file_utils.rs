//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::natural_order::natural_cmp;

/// Supported raw microscopy image extensions.
pub const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Returns the regular files in `dir` whose name ends with `.{suffix}`,
/// matched case-insensitively and sorted in natural (human) order.
///
/// `suffix` may span several dots, e.g. `"json.gz"`.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    let wanted = format!(".{}", suffix.to_ascii_lowercase());

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            file_name_str(path)
                .map(|name| name.to_ascii_lowercase().ends_with(&wanted))
                .unwrap_or(false)
        })
        .collect();

    sort_naturally(&mut files);
    Ok(files)
}

/// Sort paths by file name in natural order.
pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        natural_cmp(
            file_name_str(a).unwrap_or_default(),
            file_name_str(b).unwrap_or_default(),
        )
    });
}

/// The file name with `.{suffix}` removed, if present.
pub fn file_stem_without(path: &Path, suffix: &str) -> Option<String> {
    let name = file_name_str(path)?;
    let wanted = format!(".{suffix}");
    let stem = if name.to_ascii_lowercase().ends_with(&wanted.to_ascii_lowercase()) {
        &name[..name.len() - wanted.len()]
    } else {
        name
    };
    Some(stem.to_string())
}

fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_with_suffix_sorted_naturally() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["img10.json.gz", "img2.json.gz", "img1.JSON.GZ", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.json.gz")).unwrap();

        let files = files_with_suffix(dir.path(), "json.gz").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["img1.JSON.GZ", "img2.json.gz", "img10.json.gz"]);
    }

    #[test]
    fn test_files_with_suffix_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(files_with_suffix(&dir.path().join("absent"), "json.gz").is_err());
    }

    #[test]
    fn test_file_stem_without() {
        assert_eq!(
            file_stem_without(Path::new("/a/b/img_ANALYSIS_3.json.gz"), "json.gz").as_deref(),
            Some("img_ANALYSIS_3")
        );
        assert_eq!(
            file_stem_without(Path::new("plain"), "json.gz").as_deref(),
            Some("plain")
        );
    }
}
