//! String interning pools
//!
//! A multi-million record journal repeats the same directory paths,
//! timestamps and reason labels over and over. Every pool hands out
//! `Arc<str>` so equal strings share one allocation, and `clear()` only drops
//! the pool's own references: strings already handed out stay valid.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::journal::{format_filetime, ChangeReason};

/// Concurrent content-addressed string pool with insert-if-absent semantics
#[derive(Debug, Default)]
pub struct StringPool {
    entries: DashMap<Arc<str>, ()>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical shared copy of `value`
    pub fn intern(&self, value: &str) -> Arc<str> {
        if let Some(existing) = self.entries.get(value) {
            return existing.key().clone();
        }

        // A racing writer may win between the lookup and the insert; the
        // entry API then hands back its key and ours is dropped.
        self.entries
            .entry(Arc::from(value))
            .or_insert(())
            .key()
            .clone()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Label pool for the closed set of change reasons
#[derive(Debug, Default)]
pub struct ReasonPool {
    labels: Mutex<HashMap<ChangeReason, Arc<str>>>,
}

impl ReasonPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, reason: ChangeReason) -> Arc<str> {
        let mut labels = self.labels.lock().unwrap_or_else(|e| e.into_inner());
        labels
            .entry(reason)
            .or_insert_with(|| Arc::from(reason.label()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.labels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.labels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Pool sizes at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub paths: usize,
    pub timestamps: usize,
    pub lowercase_paths: usize,
    pub extensions: usize,
    pub reasons: usize,
}

/// All pools used by one pipeline run, shared between drives via `Arc`
#[derive(Debug, Default)]
pub struct InternPools {
    pub paths: StringPool,
    pub timestamps: StringPool,
    pub lowercase_paths: StringPool,
    pub extensions: StringPool,
    pub reasons: ReasonPool,
}

impl InternPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn intern_path(&self, path: &str) -> Arc<str> {
        self.paths.intern(path)
    }

    pub fn intern_reason(&self, reason: ChangeReason) -> Arc<str> {
        self.reasons.intern(reason)
    }

    /// Display string for a FILETIME tick count, interned
    pub fn intern_timestamp(&self, ticks: i64) -> Arc<str> {
        self.timestamps.intern(&format_filetime(ticks))
    }

    pub fn intern_lowercase_path(&self, path: &str) -> Arc<str> {
        self.lowercase_paths.intern(&path.to_lowercase())
    }

    /// Lowercased extension of the leaf name, if it has one
    pub fn intern_extension(&self, path: &str) -> Option<Arc<str>> {
        extension_of(path).map(|ext| self.extensions.intern(&ext.to_lowercase()))
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            paths: self.paths.len(),
            timestamps: self.timestamps.len(),
            lowercase_paths: self.lowercase_paths.len(),
            extensions: self.extensions.len(),
            reasons: self.reasons.len(),
        }
    }

    /// Drop every pooled string; call between batches or on memory pressure
    pub fn clear(&self) {
        self.paths.clear();
        self.timestamps.clear();
        self.lowercase_paths.clear();
        self.extensions.clear();
        self.reasons.clear();
        tracing::debug!("Cleared intern pools");
    }
}

/// Extension of the last path component, without the dot.
/// Dot-files (`.gitignore`) and trailing dots have none.
fn extension_of(path: &str) -> Option<&str> {
    let leaf = path.rsplit('\\').next().unwrap_or(path);
    match leaf.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < leaf.len() => Some(&leaf[dot + 1..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_storage_for_equal_content() {
        let pool = StringPool::new();
        let owned = String::from("C:\\Users\\alice\\notes.txt");

        let first = pool.intern(&owned);
        let second = pool.intern("C:\\Users\\alice\\notes.txt");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_clear_keeps_returned_strings() {
        let pool = StringPool::new();
        let kept = pool.intern("C:\\a.txt");
        pool.clear();

        assert!(pool.is_empty());
        assert_eq!(&*kept, "C:\\a.txt");

        let fresh = pool.intern("C:\\a.txt");
        assert!(!Arc::ptr_eq(&kept, &fresh));
        assert_eq!(kept, fresh);
    }

    #[test]
    fn test_concurrent_interning_converges() {
        use rayon::prelude::*;

        let pool = StringPool::new();
        let interned: Vec<Arc<str>> = (0..10_000)
            .into_par_iter()
            .map(|i| pool.intern(&format!("C:\\dir{}\\file.txt", i % 10)))
            .collect();

        assert_eq!(pool.len(), 10);
        for value in &interned {
            let canonical = pool.intern(value);
            assert!(Arc::ptr_eq(value, &canonical));
        }
    }

    #[test]
    fn test_reason_pool() {
        let pools = InternPools::new();
        let a = pools.intern_reason(ChangeReason::Created);
        let b = pools.intern_reason(ChangeReason::Created);
        pools.intern_reason(ChangeReason::Closed);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(&*a, "Created");
        assert_eq!(pools.reasons.len(), 2);
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(extension_of("C:\\Docs\\Report.PDF"), Some("PDF"));
        assert_eq!(extension_of("C:\\Docs.d\\Makefile"), None);
        assert_eq!(extension_of("C:\\repo\\.gitignore"), None);
        assert_eq!(extension_of("C:\\trailing."), None);
        assert_eq!(extension_of("archive.tar.gz"), Some("gz"));

        let pools = InternPools::new();
        let ext = pools.intern_extension("C:\\Docs\\Report.PDF").unwrap();
        assert_eq!(&*ext, "pdf");
        assert!(pools.intern_extension("C:\\Docs\\Makefile").is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let pools = InternPools::new();
        pools.intern_path("C:\\a");
        pools.intern_path("C:\\a");
        pools.intern_lowercase_path("C:\\A");
        pools.intern_timestamp(0);
        pools.intern_reason(ChangeReason::Deleted);

        let stats = pools.stats();
        assert_eq!(stats.paths, 1);
        assert_eq!(stats.lowercase_paths, 1);
        assert_eq!(stats.timestamps, 1);
        assert_eq!(stats.reasons, 1);

        pools.clear();
        assert_eq!(pools.stats(), PoolStats::default());
    }
}
