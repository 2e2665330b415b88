//! Pipeline orchestration
//!
//! Each drive goes through Extract, ReadJournal, ResolvePaths and Sort.
//! Drives run in parallel and only share the intern pools.

pub mod cancel;
pub mod engine;
pub mod progress;
pub mod report;

pub use cancel::CancellationToken;
pub use engine::{JournalPipeline, PipelineConfig};
pub use progress::{PipelineProgress, PipelineStage, PROGRESS_SCALE};
pub use report::{DriveReport, DriveStatistics, DriveStatus, FailureKind, RunReport};
