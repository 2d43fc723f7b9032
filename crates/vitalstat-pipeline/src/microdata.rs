//! Microdata loader collaborator boundary.
//!
//! The pipeline only depends on the trait: a path plus a row limit in,
//! a sampled dataset with metadata out. Failures here never abort a
//! cycle; calibration proceeds with whatever sources succeeded.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MicrodataError {
    #[error("microdata io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no natality export (*.txt) found in {0}")]
    NotFound(PathBuf),
}

#[derive(Debug, Clone)]
pub struct MicrodataMeta {
    pub path: PathBuf,
    pub year: u16,
    pub rows_read: usize,
    /// True when the file held more rows than the limit.
    pub truncated: bool,
}

/// A row sample from a microdata export. Rows are kept as raw lines;
/// interpreting the fixed-width layout is the calibrator's concern.
#[derive(Debug, Clone)]
pub struct MicrodataSample {
    pub records: Vec<String>,
    pub meta: MicrodataMeta,
}

pub trait MicrodataLoader: Send + Sync {
    fn load(&self, row_limit: usize) -> Result<MicrodataSample, MicrodataError>;
}

/// Loader for NCHS natality microdata text exports.
#[derive(Debug, Clone)]
pub struct NatalityLoader {
    path: PathBuf,
    year: u16,
}

impl NatalityLoader {
    pub fn new(path: impl Into<PathBuf>, year: u16) -> Self {
        Self {
            path: path.into(),
            year,
        }
    }

    /// Pick the first `*.txt` export (lexicographic) in a directory.
    pub fn discover(dir: &Path, year: u16) -> Result<Self, MicrodataError> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .map(|path| Self::new(path, year))
            .ok_or_else(|| MicrodataError::NotFound(dir.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MicrodataLoader for NatalityLoader {
    fn load(&self, row_limit: usize) -> Result<MicrodataSample, MicrodataError> {
        let file = File::open(&self.path)?;
        let mut lines = BufReader::new(file).lines();

        let mut records = Vec::new();
        for line in lines.by_ref().take(row_limit) {
            records.push(line?);
        }
        let truncated = lines.next().is_some();

        let rows_read = records.len();
        tracing::info!(
            path = %self.path.display(),
            rows = rows_read,
            truncated,
            "loaded natality microdata sample"
        );

        Ok(MicrodataSample {
            records,
            meta: MicrodataMeta {
                path: self.path.clone(),
                year: self.year,
                rows_read,
                truncated,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_respects_the_row_limit_and_reports_truncation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("natality2023.txt");
        let mut file = File::create(&path).expect("create");
        for row in 0..10 {
            writeln!(file, "record-{row}").expect("write");
        }

        let sample = NatalityLoader::new(&path, 2023).load(4).expect("loads");
        assert_eq!(sample.records.len(), 4);
        assert!(sample.meta.truncated);
        assert_eq!(sample.meta.year, 2023);

        let full = NatalityLoader::new(&path, 2023).load(100).expect("loads");
        assert_eq!(full.records.len(), 10);
        assert!(!full.meta.truncated);
    }

    #[test]
    fn discover_prefers_the_first_txt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        File::create(dir.path().join("b.txt")).expect("create");
        File::create(dir.path().join("a.txt")).expect("create");
        File::create(dir.path().join("ignored.csv")).expect("create");

        let loader = NatalityLoader::discover(dir.path(), 2023).expect("found");
        assert!(loader.path().ends_with("a.txt"));
    }

    #[test]
    fn discover_fails_cleanly_on_an_empty_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = NatalityLoader::discover(dir.path(), 2023).expect_err("nothing to find");
        assert!(matches!(error, MicrodataError::NotFound(_)));
    }
}
