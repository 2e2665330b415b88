/// Stage bookkeeping and progress reporting
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::Drive;

pub const PROGRESS_SCALE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Extract,
    ReadJournal,
    ResolvePaths,
    Sort,
}

impl PipelineStage {
    /// Inclusive percentage band owned by the stage
    pub fn range(self) -> (u32, u32) {
        match self {
            PipelineStage::Extract => (0, 20),
            PipelineStage::ReadJournal => (21, 60),
            PipelineStage::ResolvePaths => (61, 80),
            PipelineStage::Sort => (81, 100),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::Extract => "Extracting journal",
            PipelineStage::ReadJournal => "Reading journal",
            PipelineStage::ResolvePaths => "Resolving paths",
            PipelineStage::Sort => "Sorting entries",
        }
    }

    /// Overall percentage for `done` of `total` units inside this stage, floored.
    /// A stage with nothing to do counts as finished.
    pub fn percent(self, done: usize, total: usize) -> u32 {
        let (lo, hi) = self.range();
        if total == 0 {
            return hi;
        }
        let done = done.min(total) as u64;
        let span = u64::from(hi - lo);
        lo + (span * done / total as u64) as u32
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineProgress {
    pub drive: Drive,
    pub stage: PipelineStage,
    pub percent: u32,
    pub scale: u32,
    pub label: String,
    pub items_done: usize,
    pub items_total: usize,
}

pub(crate) type ProgressCallback = Arc<dyn Fn(PipelineProgress) + Send + Sync>;

/// Per-drive reporter; drops updates that would move the bar backwards,
/// which parallel workers otherwise produce
pub(crate) struct ProgressReporter {
    drive: Drive,
    callback: Option<ProgressCallback>,
    last_percent: AtomicU32,
}

impl ProgressReporter {
    pub(crate) fn new(drive: Drive, callback: Option<ProgressCallback>) -> Self {
        Self {
            drive,
            callback,
            last_percent: AtomicU32::new(0),
        }
    }

    pub(crate) fn report(&self, stage: PipelineStage, done: usize, total: usize) {
        let Some(callback) = &self.callback else {
            return;
        };

        let percent = stage.percent(done, total);
        let previous = self.last_percent.fetch_max(percent, Ordering::AcqRel);
        if percent < previous {
            return;
        }

        callback(PipelineProgress {
            drive: self.drive,
            stage,
            percent,
            scale: PROGRESS_SCALE,
            label: format!("{}: {}", self.drive, stage.label()),
            items_done: done,
            items_total: total,
        });
    }
}
