/// Ancestor map consumed by the path resolver
///
/// Built by an `AncestorSource` for exactly the FRNs a batch references.
/// `parent_of` and `name_of` are read-only once built; `resolved_of` doubles
/// as the memo cache the resolver writes reconstructed ancestor paths into.
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Entry index of the volume root directory
pub const ROOT_FRN: u64 = 5;

/// Root FRN, or the zero reference some tools emit for it
pub fn is_root_frn(frn: u64) -> bool {
    frn == ROOT_FRN || frn == 0
}

#[derive(Debug, Default)]
pub struct AncestorMap {
    parent_of: HashMap<u64, u64>,
    name_of: HashMap<u64, String>,
    resolved_of: DashMap<u64, Arc<str>>,
}

impl AncestorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        parent_of: HashMap<u64, u64>,
        name_of: HashMap<u64, String>,
        resolved_of: HashMap<u64, String>,
    ) -> Self {
        Self {
            parent_of,
            name_of,
            resolved_of: resolved_of
                .into_iter()
                .map(|(frn, path)| (frn, Arc::from(path)))
                .collect(),
        }
    }

    /// Record a directory entry: its parent and its leaf name
    pub fn insert_entry(&mut self, frn: u64, parent: u64, name: impl Into<String>) {
        self.parent_of.insert(frn, parent);
        self.name_of.insert(frn, name.into());
    }

    /// Record an absolute path already known for `frn`
    pub fn insert_resolved(&self, frn: u64, path: impl Into<Arc<str>>) {
        self.resolved_of.insert(frn, path.into());
    }

    pub fn parent_of(&self, frn: u64) -> Option<u64> {
        self.parent_of.get(&frn).copied()
    }

    pub fn name_of(&self, frn: u64) -> Option<&str> {
        self.name_of.get(&frn).map(String::as_str)
    }

    pub fn resolved(&self, frn: u64) -> Option<Arc<str>> {
        self.resolved_of.get(&frn).map(|path| path.value().clone())
    }

    pub fn entry_count(&self) -> usize {
        self.parent_of.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_of.is_empty() && self.name_of.is_empty() && self.resolved_of.is_empty()
    }

    /// Release all three maps once a drive's resolve stage is over
    pub fn clear(&mut self) {
        self.parent_of = HashMap::new();
        self.name_of = HashMap::new();
        self.resolved_of.clear();
        self.resolved_of.shrink_to_fit();
    }
}
