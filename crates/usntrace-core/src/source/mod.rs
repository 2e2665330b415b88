//! Collaborator boundary
//!
//! The core never talks to the operating system itself. Raw journal bytes and
//! the ancestor map come from implementations of the two traits below: the
//! file-backed ones in this module, a live-volume reader elsewhere, or plain
//! closures in tests.

pub mod file;
pub mod snapshot;

pub use file::{FileJournalSource, JournalData};
pub use snapshot::{AncestorSnapshot, SnapshotAncestorSource, SnapshotEntry};

use std::collections::HashSet;
use thiserror::Error;

use crate::resolve::AncestorMap;
use crate::Drive;

/// Drive-level acquisition failure; the drive contributes no entries
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no change journal available for {0}")]
    NoJournal(Drive),

    #[error("access denied reading {what} for {drive}")]
    AccessDenied { drive: Drive, what: &'static str },

    #[error("unreadable {what} for {drive}: {detail}")]
    Unreadable {
        drive: Drive,
        what: &'static str,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the raw change journal of one volume
pub trait JournalSource: Send + Sync {
    /// Raw journal bytes; an empty buffer means the journal holds no records
    fn read_journal(&self, drive: Drive) -> Result<JournalData, SourceError>;
}

/// Supplies parent/name relationships for the FRNs a batch references
pub trait AncestorSource: Send + Sync {
    /// Build the ancestor map for `needed` (and whatever ancestors those need)
    fn build_parent_path_map(
        &self,
        drive: Drive,
        needed: &HashSet<u64>,
    ) -> Result<AncestorMap, SourceError>;
}

impl<F> JournalSource for F
where
    F: Fn(Drive) -> Result<JournalData, SourceError> + Send + Sync,
{
    fn read_journal(&self, drive: Drive) -> Result<JournalData, SourceError> {
        self(drive)
    }
}

impl<F> AncestorSource for F
where
    F: Fn(Drive, &HashSet<u64>) -> Result<AncestorMap, SourceError> + Send + Sync,
{
    fn build_parent_path_map(
        &self,
        drive: Drive,
        needed: &HashSet<u64>,
    ) -> Result<AncestorMap, SourceError> {
        self(drive, needed)
    }
}

/// Classify an I/O error the way drive reports present it
pub(crate) fn classify_io_error(
    drive: Drive,
    what: &'static str,
    error: std::io::Error,
) -> SourceError {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => SourceError::AccessDenied { drive, what },
        _ => SourceError::Io(error),
    }
}
