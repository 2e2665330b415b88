use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub mod export;
pub mod intern;
pub mod journal;
pub mod pipeline;
pub mod resolve;
pub mod source;

// Re-export the types most callers need
pub use intern::{InternPools, PoolStats, StringPool};
pub use journal::{ChangeReason, JournalReader, RawJournalRecord};
pub use pipeline::{
    CancellationToken, DriveReport, DriveStatistics, DriveStatus, FailureKind, JournalPipeline,
    PipelineConfig, PipelineProgress, PipelineStage, RunReport,
};
pub use resolve::{AncestorMap, PathResolver};
pub use source::{
    AncestorSource, FileJournalSource, JournalData, JournalSource, SnapshotAncestorSource,
    SourceError,
};

/// A volume identified by its drive letter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Drive(char);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid drive '{0}', expected a letter such as C or C:")]
pub struct InvalidDrive(pub String);

impl Drive {
    /// Drive for an ASCII letter, normalized to upper case
    pub fn new(letter: char) -> Option<Self> {
        letter
            .is_ascii_alphabetic()
            .then(|| Drive(letter.to_ascii_uppercase()))
    }

    pub fn letter(self) -> char {
        self.0
    }

    /// Volume root, e.g. `C:\`
    pub fn root_path(self) -> String {
        format!("{}:\\", self.0)
    }
}

impl std::fmt::Display for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.0)
    }
}

impl FromStr for Drive {
    type Err = InvalidDrive;

    /// Accepts `C`, `c:`, `C:\` and `C:/`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed
            .strip_suffix('\\')
            .or_else(|| trimmed.strip_suffix('/'))
            .unwrap_or(trimmed);
        let rest = rest.strip_suffix(':').unwrap_or(rest);

        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Drive::new(letter).ok_or_else(|| InvalidDrive(s.to_string())),
            _ => Err(InvalidDrive(s.to_string())),
        }
    }
}

/// One resolved, classified journal change
///
/// Strings are shared with the intern pools the entry was built from;
/// the display timestamp is derived on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub full_path: Arc<str>,
    pub reason_label: Arc<str>,
    /// FILETIME ticks (100ns since 1601-01-01 UTC)
    pub file_time: i64,
    pub usn: i64,
    pub reason_bits: u32,
}

impl JournalEntry {
    /// `YYYY-MM-DD HH:MM:SS` in UTC, shared through the timestamp pool
    pub fn timestamp_display(&self, pools: &InternPools) -> Arc<str> {
        pools.intern_timestamp(self.file_time)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        journal::filetime_to_datetime(self.file_time)
    }

    pub fn extension(&self, pools: &InternPools) -> Option<Arc<str>> {
        pools.intern_extension(&self.full_path)
    }

    pub fn lowercase_path(&self, pools: &InternPools) -> Arc<str> {
        pools.intern_lowercase_path(&self.full_path)
    }

    /// Classification recomputed from the raw mask
    pub fn reason(&self) -> ChangeReason {
        ChangeReason::classify(self.reason_bits)
    }
}

/// Pipeline over journal dumps and ancestor snapshots on disk, plus the
/// drives it should be run on
pub fn file_pipeline(
    journals: &[(Drive, PathBuf)],
    snapshots: &[(Drive, PathBuf)],
    config: PipelineConfig,
    pools: Arc<InternPools>,
) -> Result<(JournalPipeline, Vec<Drive>)> {
    if journals.is_empty() {
        anyhow::bail!("no journal dumps given");
    }

    let mut journal_source = FileJournalSource::new();
    for (drive, path) in journals {
        if journal_source.path_for(*drive).is_some() {
            anyhow::bail!("more than one journal dump given for {}", drive);
        }
        journal_source.insert(*drive, path.clone());
    }

    let mut ancestor_source = SnapshotAncestorSource::new().with_max_depth(config.max_climb_depth);
    for (drive, path) in snapshots {
        ancestor_source.insert(*drive, path.clone());
    }

    let drives = journal_source.drives();
    Ok((
        JournalPipeline::new(config, journal_source, ancestor_source, pools),
        drives,
    ))
}

/// Run the pipeline over journal dumps and ancestor snapshots on disk
pub fn scan_files(
    journals: &[(Drive, PathBuf)],
    snapshots: &[(Drive, PathBuf)],
    config: PipelineConfig,
    pools: Arc<InternPools>,
) -> Result<RunReport> {
    let (pipeline, drives) = file_pipeline(journals, snapshots, config, pools)?;
    Ok(pipeline.run(&drives))
}
