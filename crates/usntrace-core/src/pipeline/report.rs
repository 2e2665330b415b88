/// Per-drive and per-run results
use serde::Serialize;
use uuid::Uuid;

use crate::resolve::ResolveSummary;
use crate::source::SourceError;
use crate::{Drive, JournalEntry};

/// Category of a drive-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    NoJournal,
    AccessDenied,
    Unreadable,
    Io,
    /// A journal or ancestor source panicked while serving the drive
    Panicked,
}

impl From<&SourceError> for FailureKind {
    fn from(error: &SourceError) -> Self {
        match error {
            SourceError::NoJournal(_) => FailureKind::NoJournal,
            SourceError::AccessDenied { .. } => FailureKind::AccessDenied,
            SourceError::Unreadable { .. } => FailureKind::Unreadable,
            SourceError::Io(_) => FailureKind::Io,
        }
    }
}

/// How a drive's pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DriveStatus {
    /// Entries were produced (some paths may still be placeholders)
    Completed,
    /// The pass ran but there was nothing to report
    Empty { reason: String },
    /// Acquisition failed; the drive contributes nothing
    Failed { kind: FailureKind, reason: String },
    /// Stopped by the caller; partial output is discarded
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveStatistics {
    pub journal_bytes: usize,
    pub records_decoded: usize,
    pub records_skipped: usize,
    pub padding_regions: usize,
    pub referenced_frns: usize,
    pub ancestor_entries: usize,
    pub resolve: ResolveSummary,
    pub unknown_reasons: usize,
    pub entries: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriveReport {
    pub drive: Drive,
    pub status: DriveStatus,
    /// Sorted by `file_time`, newest first
    pub entries: Vec<JournalEntry>,
    pub statistics: DriveStatistics,
}

impl DriveReport {
    pub(crate) fn without_entries(
        drive: Drive,
        status: DriveStatus,
        statistics: DriveStatistics,
    ) -> Self {
        Self {
            drive,
            status,
            entries: Vec::new(),
            statistics,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == DriveStatus::Completed
    }

    /// Why the drive has no entries, if it has none
    pub fn empty_reason(&self) -> Option<&str> {
        match &self.status {
            DriveStatus::Completed => None,
            DriveStatus::Empty { reason } | DriveStatus::Failed { reason, .. } => {
                Some(reason.as_str())
            }
            DriveStatus::Cancelled => Some("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// One report per requested drive, in request order
    pub drives: Vec<DriveReport>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn total_entries(&self) -> usize {
        self.drives.iter().map(|d| d.entries.len()).sum()
    }

    pub fn drive(&self, drive: Drive) -> Option<&DriveReport> {
        self.drives.iter().find(|d| d.drive == drive)
    }

    pub fn failed_drives(&self) -> impl Iterator<Item = &DriveReport> {
        self.drives
            .iter()
            .filter(|d| matches!(d.status, DriveStatus::Failed { .. }))
    }

    pub fn was_cancelled(&self) -> bool {
        self.drives.iter().any(|d| d.status == DriveStatus::Cancelled)
    }

    /// Every drive's entries in one sequence, newest first; ties keep drive order
    pub fn merged_entries(&self) -> Vec<JournalEntry> {
        let mut merged: Vec<JournalEntry> = self
            .drives
            .iter()
            .flat_map(|d| d.entries.iter().cloned())
            .collect();
        sort_newest_first(&mut merged);
        merged
    }
}

/// Stable descending sort by `file_time`
pub(crate) fn sort_newest_first(entries: &mut [JournalEntry]) {
    use rayon::slice::ParallelSliceMut;
    entries.par_sort_by(|a, b| b.file_time.cmp(&a.file_time));
}
