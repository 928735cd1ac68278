//! Report persistence.
//!
//! Reports are write-once: each run gets a fresh timestamped file name, the
//! content is written to a hidden temporary file and linked into place, so a
//! reader listing the directory never sees a partially written report. The
//! link fails rather than replace an existing file, even one created by
//! another writer between choosing the name and publishing it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use filterbench_core::BenchResult;
use tempfile::{NamedTempFile, PersistError};

use super::{Report, ReportCategory};

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Destination for finished reports.
pub trait ReportSink {
    /// Persist `report` under `category`; returns the artifact name.
    fn write(&mut self, category: ReportCategory, report: &Report) -> BenchResult<String>;
}

/// Writes reports as JSON files into one directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> BenchResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for DirectorySink {
    fn write(&mut self, category: ReportCategory, report: &Report) -> BenchResult<String> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), report)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;

        // bump the timestamp rather than overwrite a report from the same millisecond
        let mut millis = report.timestamp().max(1);
        loop {
            let name = category.file_name(millis);
            let path = self.dir.join(&name);
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!("Wrote report {}", path.display());
                    return Ok(name);
                }
                Err(PersistError { error, file }) if error.kind() == ErrorKind::AlreadyExists => {
                    tmp = file;
                    millis += 1;
                }
                Err(PersistError { error, .. }) => return Err(error.into()),
            }
        }
    }
}

/// Keeps reports in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Vec<(String, Report)>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports written so far, in write order.
    pub fn entries(&self) -> &[(String, Report)] {
        &self.entries
    }
}

impl ReportSink for MemorySink {
    fn write(&mut self, category: ReportCategory, report: &Report) -> BenchResult<String> {
        let mut millis = report.timestamp();
        while self
            .entries
            .iter()
            .any(|(name, _)| *name == category.file_name(millis))
        {
            millis += 1;
        }
        let name = category.file_name(millis);
        self.entries.push((name.clone(), report.clone()));
        Ok(name)
    }
}
