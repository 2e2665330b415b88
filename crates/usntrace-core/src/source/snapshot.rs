/// Ancestor snapshots on disk
///
/// An MFT walk exported as JSON: one entry per directory (or file) with its
/// parent FRN, leaf name and, optionally, an absolute path the exporter
/// already knew. Only the slice of the snapshot a batch needs is turned into
/// an `AncestorMap`.
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::{classify_io_error, AncestorSource, SourceError};
use crate::journal::FRN_INDEX_MASK;
use crate::resolve::{is_root_frn, AncestorMap, DEFAULT_MAX_CLIMB_DEPTH};
use crate::Drive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub frn: u64,
    pub parent: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SnapshotEntry {
    /// Entry index of `frn`; exporters may write full references with the sequence number
    pub fn index(&self) -> u64 {
        self.frn & FRN_INDEX_MASK
    }

    pub fn parent_index(&self) -> u64 {
        self.parent & FRN_INDEX_MASK
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl AncestorSnapshot {
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    /// Map restricted to `needed` plus the ancestor chains they lead to.
    ///
    /// Chains stop at the root, at an entry with a known path, at an FRN
    /// already included, at a missing entry, or after `max_depth` hops.
    pub fn to_ancestor_map(&self, needed: &HashSet<u64>, max_depth: usize) -> AncestorMap {
        let index: HashMap<u64, &SnapshotEntry> =
            self.entries.iter().map(|entry| (entry.index(), entry)).collect();

        let mut map = AncestorMap::new();
        let mut included: HashSet<u64> = HashSet::new();

        for &frn in needed {
            let mut current = frn & FRN_INDEX_MASK;
            for _ in 0..=max_depth {
                if is_root_frn(current) || !included.insert(current) {
                    break;
                }
                let Some(entry) = index.get(&current) else {
                    break;
                };

                map.insert_entry(current, entry.parent_index(), entry.name.clone());
                if let Some(path) = &entry.path {
                    map.insert_resolved(current, path.as_str());
                    break;
                }
                current = entry.parent_index();
            }
        }

        map
    }
}

/// One snapshot file per drive
#[derive(Debug, Clone)]
pub struct SnapshotAncestorSource {
    paths: HashMap<Drive, PathBuf>,
    max_depth: usize,
}

impl Default for SnapshotAncestorSource {
    fn default() -> Self {
        Self {
            paths: HashMap::new(),
            max_depth: DEFAULT_MAX_CLIMB_DEPTH,
        }
    }
}

impl SnapshotAncestorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drive(mut self, drive: Drive, path: impl Into<PathBuf>) -> Self {
        self.insert(drive, path);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn insert(&mut self, drive: Drive, path: impl Into<PathBuf>) {
        self.paths.insert(drive, path.into());
    }

    pub fn path_for(&self, drive: Drive) -> Option<&Path> {
        self.paths.get(&drive).map(PathBuf::as_path)
    }

    fn load(&self, drive: Drive) -> Result<AncestorSnapshot, SourceError> {
        let path = self.path_for(drive).ok_or_else(|| SourceError::Unreadable {
            drive,
            what: "ancestor snapshot",
            detail: "no snapshot configured".to_string(),
        })?;

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::Unreadable {
                drive,
                what: "ancestor snapshot",
                detail: format!("{} not found", path.display()),
            },
            _ => classify_io_error(drive, "ancestor snapshot", e),
        })?;

        AncestorSnapshot::from_reader(BufReader::new(file)).map_err(|e| SourceError::Unreadable {
            drive,
            what: "ancestor snapshot",
            detail: e.to_string(),
        })
    }
}

impl AncestorSource for SnapshotAncestorSource {
    fn build_parent_path_map(
        &self,
        drive: Drive,
        needed: &HashSet<u64>,
    ) -> Result<AncestorMap, SourceError> {
        let snapshot = self.load(drive)?;
        let map = snapshot.to_ancestor_map(needed, self.max_depth);

        tracing::info!(
            "Ancestor map for {}: {} of {} snapshot entries kept for {} referenced FRNs",
            drive,
            map.entry_count(),
            snapshot.entries.len(),
            needed.len()
        );

        Ok(map)
    }
}
