/// Staged journal-to-timeline pipeline
use rayon::prelude::*;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::progress::{PipelineProgress, PipelineStage, ProgressCallback, ProgressReporter};
use super::report::{
    sort_newest_first, DriveReport, DriveStatistics, DriveStatus, FailureKind, RunReport,
};
use crate::intern::InternPools;
use crate::journal::{ChangeReason, JournalReader, RawJournalRecord};
use crate::resolve::{is_root_frn, AncestorMap, PathResolver, DEFAULT_MAX_CLIMB_DEPTH};
use crate::source::{AncestorSource, JournalSource, SourceError};
use crate::{Drive, JournalEntry};

/// Size of the next-USN prefix at the start of a raw journal read buffer
const LEADING_USN_LEN: usize = 8;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on ancestors walked for one path
    pub max_climb_depth: usize,
    pub parallel_resolution: bool,
    /// Records between progress callbacks in the read and resolve stages
    pub progress_interval: usize,
    /// Journal dumps start with the 8-byte next-USN header
    pub skip_leading_usn: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_climb_depth: DEFAULT_MAX_CLIMB_DEPTH,
            parallel_resolution: true,
            progress_interval: 10_000,
            skip_leading_usn: false,
        }
    }
}

/// Why a drive's pass stopped before producing entries
#[derive(Debug)]
enum DriveAbort {
    Cancelled,
    Empty(String),
    Source(SourceError),
}

impl From<SourceError> for DriveAbort {
    fn from(error: SourceError) -> Self {
        DriveAbort::Source(error)
    }
}

pub struct JournalPipeline {
    config: PipelineConfig,
    journal_source: Box<dyn JournalSource>,
    ancestor_source: Box<dyn AncestorSource>,
    pools: Arc<InternPools>,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl JournalPipeline {
    pub fn new(
        config: PipelineConfig,
        journal_source: impl JournalSource + 'static,
        ancestor_source: impl AncestorSource + 'static,
        pools: Arc<InternPools>,
    ) -> Self {
        Self {
            config,
            journal_source: Box::new(journal_source),
            ancestor_source: Box::new(ancestor_source),
            pools,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(PipelineProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
    }

    /// Handle for stopping a run from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pools(&self) -> &Arc<InternPools> {
        &self.pools
    }

    /// Process every drive in parallel. Reports come back in request order
    /// and one drive's failure never touches another's.
    pub fn run(&self, drives: &[Drive]) -> RunReport {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        tracing::info!("Starting journal run {} over {} drive(s)", run_id, drives.len());

        let reports: Vec<DriveReport> = drives
            .par_iter()
            .map(|&drive| self.process_drive_isolated(drive))
            .collect();

        let report = RunReport {
            run_id,
            drives: reports,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Run {} finished: {} entries, {} failed drive(s) in {}ms",
            run_id,
            report.total_entries(),
            report.failed_drives().count(),
            report.elapsed_ms
        );

        report
    }

    /// `process_drive`, with a panic in a collaborator turned into a failed drive
    fn process_drive_isolated(&self, drive: Drive) -> DriveReport {
        let started = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| self.process_drive(drive))) {
            Ok(report) => report,
            Err(payload) => {
                let reason = format!("drive pass panicked: {}", panic_message(payload.as_ref()));
                tracing::error!("{}: {}", drive, reason);
                let statistics = DriveStatistics {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    ..DriveStatistics::default()
                };
                let status = DriveStatus::Failed {
                    kind: FailureKind::Panicked,
                    reason,
                };
                DriveReport::without_entries(drive, status, statistics)
            }
        }
    }

    /// Run all four stages for one drive
    pub fn process_drive(&self, drive: Drive) -> DriveReport {
        let started = Instant::now();
        let reporter = ProgressReporter::new(drive, self.progress_callback.clone());
        let mut statistics = DriveStatistics::default();

        let outcome = self.run_stages(drive, &reporter, &mut statistics);
        statistics.elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(entries) => {
                statistics.entries = entries.len();
                tracing::info!(
                    "{}: {} entries ({} skipped records, {} unresolved paths) in {}ms",
                    drive,
                    entries.len(),
                    statistics.records_skipped,
                    statistics.resolve.unresolved(),
                    statistics.elapsed_ms
                );
                DriveReport {
                    drive,
                    status: DriveStatus::Completed,
                    entries,
                    statistics,
                }
            }
            Err(DriveAbort::Empty(reason)) => {
                tracing::info!("{}: {}", drive, reason);
                DriveReport::without_entries(drive, DriveStatus::Empty { reason }, statistics)
            }
            Err(DriveAbort::Cancelled) => {
                tracing::info!("{}: cancelled, partial results discarded", drive);
                DriveReport::without_entries(drive, DriveStatus::Cancelled, statistics)
            }
            Err(DriveAbort::Source(error)) => {
                tracing::warn!("{}: {}", drive, error);
                let status = DriveStatus::Failed {
                    kind: FailureKind::from(&error),
                    reason: error.to_string(),
                };
                DriveReport::without_entries(drive, status, statistics)
            }
        }
    }

    fn run_stages(
        &self,
        drive: Drive,
        reporter: &ProgressReporter,
        statistics: &mut DriveStatistics,
    ) -> Result<Vec<JournalEntry>, DriveAbort> {
        // Extract
        self.checkpoint()?;
        reporter.report(PipelineStage::Extract, 0, 1);
        let data = self.journal_source.read_journal(drive)?;
        statistics.journal_bytes = data.len();
        reporter.report(PipelineStage::Extract, 1, 1);
        tracing::info!("{}: extracted {} journal bytes", drive, data.len());

        if data.is_empty() {
            return Err(DriveAbort::Empty("journal contained no records".to_string()));
        }

        // ReadJournal
        self.checkpoint()?;
        let records = self.read_records(drive, &data, reporter, statistics)?;
        drop(data);

        if records.is_empty() {
            return Err(DriveAbort::Empty("no decodable records in journal".to_string()));
        }

        self.checkpoint()?;
        let needed = referenced_frns(&records);
        statistics.referenced_frns = needed.len();
        let mut map = self.ancestor_source.build_parent_path_map(drive, &needed)?;
        statistics.ancestor_entries = map.entry_count();

        // ResolvePaths
        self.checkpoint()?;
        let resolved = self.resolve_records(drive, &records, &map, reporter, statistics);
        map.clear();
        drop(records);
        let mut entries = resolved?;

        // Sort
        self.checkpoint()?;
        reporter.report(PipelineStage::Sort, 0, 1);
        sort_newest_first(&mut entries);
        reporter.report(PipelineStage::Sort, 1, 1);

        Ok(entries)
    }

    fn read_records(
        &self,
        drive: Drive,
        data: &[u8],
        reporter: &ProgressReporter,
        statistics: &mut DriveStatistics,
    ) -> Result<Vec<RawJournalRecord>, DriveAbort> {
        let total = data.len();
        let interval = self.config.progress_interval.max(1);
        let mut reader = if self.config.skip_leading_usn {
            JournalReader::starting_at(data, LEADING_USN_LEN)
        } else {
            JournalReader::new(data)
        };

        reporter.report(PipelineStage::ReadJournal, 0, total);

        let mut records = Vec::new();
        while let Some(record) = reader.next() {
            if self.cancel.is_cancelled() {
                return Err(DriveAbort::Cancelled);
            }
            records.push(record);
            if records.len() % interval == 0 {
                reporter.report(PipelineStage::ReadJournal, reader.offset(), total);
            }
        }

        let stats = reader.stats();
        statistics.records_decoded = stats.records_decoded;
        statistics.records_skipped = stats.records_skipped;
        statistics.padding_regions = stats.padding_regions;
        reporter.report(PipelineStage::ReadJournal, total, total);

        if stats.records_skipped > 0 {
            tracing::warn!(
                "{}: skipped {} corrupt journal record(s)",
                drive,
                stats.records_skipped
            );
        }
        tracing::info!(
            "{}: decoded {} records ({} padding regions)",
            drive,
            stats.records_decoded,
            stats.padding_regions
        );

        Ok(records)
    }

    fn resolve_records(
        &self,
        drive: Drive,
        records: &[RawJournalRecord],
        map: &AncestorMap,
        reporter: &ProgressReporter,
        statistics: &mut DriveStatistics,
    ) -> Result<Vec<JournalEntry>, DriveAbort> {
        let resolver = PathResolver::new(map, drive).with_max_depth(self.config.max_climb_depth);
        let total = records.len();
        let interval = self.config.progress_interval.max(1);
        let done = AtomicUsize::new(0);
        let unknown = AtomicUsize::new(0);

        reporter.report(PipelineStage::ResolvePaths, 0, total);

        let resolve_one = |record: &RawJournalRecord| -> Option<JournalEntry> {
            if self.cancel.is_cancelled() {
                return None;
            }

            let path = resolver.resolve(record.parent_frn(), &record.file_name);
            let reason = ChangeReason::classify(record.reason_bits);
            if reason == ChangeReason::Unknown {
                unknown.fetch_add(1, Ordering::Relaxed);
            }

            let entry = JournalEntry {
                full_path: self.pools.intern_path(&path),
                reason_label: self.pools.intern_reason(reason),
                file_time: record.timestamp_raw,
                usn: record.usn,
                reason_bits: record.reason_bits,
            };

            let resolved = done.fetch_add(1, Ordering::Relaxed) + 1;
            if resolved % interval == 0 {
                reporter.report(PipelineStage::ResolvePaths, resolved, total);
            }
            Some(entry)
        };

        // Both branches keep decode order, which the stable sort relies on for ties
        let entries: Option<Vec<JournalEntry>> = if self.config.parallel_resolution {
            records.par_iter().map(&resolve_one).collect()
        } else {
            records.iter().map(&resolve_one).collect()
        };
        let entries = entries.ok_or(DriveAbort::Cancelled)?;

        let summary = resolver.summary();
        statistics.resolve = summary;
        statistics.unknown_reasons = unknown.load(Ordering::Relaxed);
        reporter.report(PipelineStage::ResolvePaths, total, total);

        if summary.unresolved() > 0 {
            tracing::warn!(
                "{}: {} record(s) fell back to placeholder paths ({} cycles, {} too deep, {} broken links)",
                drive,
                summary.unresolved(),
                summary.cycles,
                summary.depth_exceeded,
                summary.broken_links
            );
        }
        tracing::info!(
            "{}: resolved {} paths ({} cache hits, {} climbs, {} at root)",
            drive,
            entries.len(),
            summary.cache_hits,
            summary.climbs,
            summary.root_parents
        );

        Ok(entries)
    }

    fn checkpoint(&self) -> Result<(), DriveAbort> {
        if self.cancel.is_cancelled() {
            Err(DriveAbort::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Every non-root FRN a batch mentions, as changed entry or as parent
fn referenced_frns(records: &[RawJournalRecord]) -> HashSet<u64> {
    records
        .iter()
        .flat_map(|record| [record.file_frn(), record.parent_frn()])
        .filter(|&frn| !is_root_frn(frn))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::reason::{USN_REASON_CLOSE, USN_REASON_FILE_CREATE};
    use crate::source::JournalData;

    fn record(parent: u64, name: &str) -> RawJournalRecord {
        RawJournalRecord {
            record_length: 64,
            major_version: 2,
            minor_version: 0,
            usn: 0,
            file_ref: 900,
            parent_ref_raw: parent | (3 << 48),
            timestamp_raw: 0,
            reason_bits: USN_REASON_FILE_CREATE | USN_REASON_CLOSE,
            source_info: 0,
            security_id: 0,
            attributes: 0,
            file_name: name.to_string(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_climb_depth, 256);
        assert!(config.parallel_resolution);
        assert_eq!(config.progress_interval, 10_000);
        assert!(!config.skip_leading_usn);
    }

    #[test]
    fn test_referenced_frns_masks_sequence_and_skips_root() {
        let records = vec![record(5, "a.txt"), record(100, "b.txt")];
        let needed = referenced_frns(&records);

        let expected: HashSet<u64> = [900, 100].into_iter().collect();
        assert_eq!(needed, expected);
    }

    #[test]
    fn test_empty_journal_is_empty_not_failed() {
        let pipeline = JournalPipeline::new(
            PipelineConfig::default(),
            |_drive: Drive| Ok::<_, SourceError>(JournalData::empty()),
            |_drive: Drive, _needed: &HashSet<u64>| Ok::<_, SourceError>(AncestorMap::new()),
            InternPools::shared(),
        );

        let report = pipeline.process_drive(Drive::new('C').unwrap());
        assert!(matches!(report.status, DriveStatus::Empty { .. }));
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_cancel_before_run() {
        let pipeline = JournalPipeline::new(
            PipelineConfig::default(),
            |_drive: Drive| Ok::<_, SourceError>(JournalData::from(vec![0u8; 64])),
            |_drive: Drive, _needed: &HashSet<u64>| Ok::<_, SourceError>(AncestorMap::new()),
            InternPools::shared(),
        );
        pipeline.cancellation_token().cancel();

        let report = pipeline.process_drive(Drive::new('D').unwrap());
        assert_eq!(report.status, DriveStatus::Cancelled);
    }
}
