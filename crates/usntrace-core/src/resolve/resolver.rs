/// Path reconstruction over an ancestor map
///
/// Walks `parent_of` upward from a record's parent with an explicit stack,
/// a visited set and a depth bound, so corrupted trees (loops, orphans,
/// absurd depth) terminate. Every intermediate directory discovered by a
/// climb is written back into the map's `resolved_of` cache; failures are
/// never cached.
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::ancestry::{is_root_frn, AncestorMap};
use crate::Drive;

pub const DEFAULT_MAX_CLIMB_DEPTH: usize = 256;

/// Directory name used in placeholder paths for unresolvable parents
pub const UNKNOWN_PARENT_DIR: &str = "UNKNOWN_MFT_PARENT";

/// Why a climb gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimbFailure {
    /// An FRN showed up twice on the same walk
    Cycle,
    /// More ancestors than the configured bound
    DepthExceeded,
    /// An ancestor without a parent or name entry
    BrokenLink,
}

/// How a record's path was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    Root,
    Cached,
    Climbed,
    Unresolved(ClimbFailure),
}

/// Counters for one resolver, safe to bump from worker threads
#[derive(Debug, Default)]
struct ResolveCounters {
    root_parents: AtomicUsize,
    cache_hits: AtomicUsize,
    climbs: AtomicUsize,
    cycles: AtomicUsize,
    depth_exceeded: AtomicUsize,
    broken_links: AtomicUsize,
}

/// Snapshot of resolver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveSummary {
    pub root_parents: usize,
    pub cache_hits: usize,
    pub climbs: usize,
    pub cycles: usize,
    pub depth_exceeded: usize,
    pub broken_links: usize,
}

impl ResolveSummary {
    pub fn unresolved(&self) -> usize {
        self.cycles + self.depth_exceeded + self.broken_links
    }

    pub fn total(&self) -> usize {
        self.root_parents + self.cache_hits + self.climbs + self.unresolved()
    }
}

pub struct PathResolver<'a> {
    map: &'a AncestorMap,
    root: Arc<str>,
    max_depth: usize,
    counters: ResolveCounters,
}

impl<'a> PathResolver<'a> {
    pub fn new(map: &'a AncestorMap, drive: Drive) -> Self {
        Self {
            map,
            root: Arc::from(drive.root_path()),
            max_depth: DEFAULT_MAX_CLIMB_DEPTH,
            counters: ResolveCounters::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Absolute path of `file_name` inside directory `parent_frn`. Never fails.
    pub fn resolve(&self, parent_frn: u64, file_name: &str) -> String {
        self.resolve_with_origin(parent_frn, file_name).0
    }

    pub fn resolve_with_origin(&self, parent_frn: u64, file_name: &str) -> (String, PathOrigin) {
        if is_root_frn(parent_frn) {
            self.counters.root_parents.fetch_add(1, Ordering::Relaxed);
            return (join_path(&self.root, file_name), PathOrigin::Root);
        }

        // Cached paths are extended as-is, including earlier placeholder paths
        if let Some(parent_path) = self.cached(parent_frn) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return (join_path(&parent_path, file_name), PathOrigin::Cached);
        }

        match self.directory_path(parent_frn) {
            Ok(parent_path) => {
                self.counters.climbs.fetch_add(1, Ordering::Relaxed);
                (join_path(&parent_path, file_name), PathOrigin::Climbed)
            }
            Err(failure) => {
                let counter = match failure {
                    ClimbFailure::Cycle => &self.counters.cycles,
                    ClimbFailure::DepthExceeded => &self.counters.depth_exceeded,
                    ClimbFailure::BrokenLink => &self.counters.broken_links,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                (self.sentinel_path(file_name), PathOrigin::Unresolved(failure))
            }
        }
    }

    /// Absolute path of directory `frn`, climbing and memoizing as needed
    pub fn directory_path(&self, frn: u64) -> Result<Arc<str>, ClimbFailure> {
        let mut pending: Vec<(u64, &str)> = Vec::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut current = frn;

        let base = loop {
            if is_root_frn(current) {
                break self.root.clone();
            }
            if let Some(path) = self.cached(current) {
                break path;
            }
            if pending.len() >= self.max_depth {
                return Err(ClimbFailure::DepthExceeded);
            }
            if !visited.insert(current) {
                return Err(ClimbFailure::Cycle);
            }

            let (Some(parent), Some(name)) =
                (self.map.parent_of(current), self.map.name_of(current))
            else {
                return Err(ClimbFailure::BrokenLink);
            };

            pending.push((current, name));
            current = parent;
        };

        let mut path = base;
        for (dir_frn, name) in pending.into_iter().rev() {
            let joined: Arc<str> = Arc::from(join_path(&path, name));
            self.map.insert_resolved(dir_frn, joined.clone());
            path = joined;
        }

        Ok(path)
    }

    /// Placeholder path for a record whose ancestry cannot be reconstructed
    pub fn sentinel_path(&self, file_name: &str) -> String {
        format!("{}{}\\{}", self.root, UNKNOWN_PARENT_DIR, file_name)
    }

    pub fn summary(&self) -> ResolveSummary {
        ResolveSummary {
            root_parents: self.counters.root_parents.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            climbs: self.counters.climbs.load(Ordering::Relaxed),
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            depth_exceeded: self.counters.depth_exceeded.load(Ordering::Relaxed),
            broken_links: self.counters.broken_links.load(Ordering::Relaxed),
        }
    }

    fn cached(&self, frn: u64) -> Option<Arc<str>> {
        self.map.resolved(frn).filter(|path| !path.is_empty())
    }
}

/// Join with a single backslash, whether or not `parent` already ends in one
pub fn join_path(parent: &str, name: &str) -> String {
    let mut joined = String::with_capacity(parent.len() + name.len() + 1);
    joined.push_str(parent);
    if !parent.ends_with('\\') {
        joined.push('\\');
    }
    joined.push_str(name);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_c() -> Drive {
        Drive::new('C').unwrap()
    }

    fn docs_tree() -> AncestorMap {
        let mut map = AncestorMap::new();
        map.insert_entry(100, 5, "Docs");
        map.insert_entry(200, 100, "Sub");
        map
    }

    #[test]
    fn test_path_composition() {
        let map = docs_tree();
        let resolver = PathResolver::new(&map, drive_c());

        let (path, origin) = resolver.resolve_with_origin(200, "file.txt");
        assert_eq!(path, "C:\\Docs\\Sub\\file.txt");
        assert_eq!(origin, PathOrigin::Climbed);
    }

    #[test]
    fn test_climb_writes_back_every_ancestor() {
        let map = docs_tree();
        let resolver = PathResolver::new(&map, drive_c());
        resolver.resolve(200, "file.txt");

        assert_eq!(map.resolved(100).as_deref(), Some("C:\\Docs"));
        assert_eq!(map.resolved(200).as_deref(), Some("C:\\Docs\\Sub"));

        let (path, origin) = resolver.resolve_with_origin(200, "other.txt");
        assert_eq!(path, "C:\\Docs\\Sub\\other.txt");
        assert_eq!(origin, PathOrigin::Cached);

        let summary = resolver.summary();
        assert_eq!(summary.climbs, 1);
        assert_eq!(summary.cache_hits, 1);
    }

    #[test]
    fn test_root_parent_and_zero_alias() {
        let map = AncestorMap::new();
        let resolver = PathResolver::new(&map, Drive::new('d').unwrap());

        assert_eq!(resolver.resolve(5, "boot.ini"), "D:\\boot.ini");
        assert_eq!(resolver.resolve(0, "boot.ini"), "D:\\boot.ini");
        assert_eq!(resolver.summary().root_parents, 2);
    }

    #[test]
    fn test_cycle_terminates_with_sentinel() {
        let mut map = AncestorMap::new();
        map.insert_entry(300, 400, "A");
        map.insert_entry(400, 300, "B");
        map.insert_entry(500, 300, "Child");
        let resolver = PathResolver::new(&map, drive_c());

        let (path, origin) = resolver.resolve_with_origin(500, "leaf.txt");
        assert_eq!(path, "C:\\UNKNOWN_MFT_PARENT\\leaf.txt");
        assert_eq!(origin, PathOrigin::Unresolved(ClimbFailure::Cycle));
        assert_eq!(map.resolved_count(), 0);
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let mut map = AncestorMap::new();
        map.insert_entry(42, 42, "Loop");
        let resolver = PathResolver::new(&map, drive_c());

        assert_eq!(resolver.directory_path(42), Err(ClimbFailure::Cycle));
    }

    #[test]
    fn test_missing_link_sentinel_not_cached() {
        let mut map = AncestorMap::new();
        map.insert_entry(700, 999, "Orphaned");
        let resolver = PathResolver::new(&map, drive_c());

        assert_eq!(resolver.resolve(12345, "x.log"), "C:\\UNKNOWN_MFT_PARENT\\x.log");
        assert_eq!(resolver.resolve(700, "y.log"), "C:\\UNKNOWN_MFT_PARENT\\y.log");
        assert!(map.resolved(12345).is_none());
        assert!(map.resolved(700).is_none());
        assert_eq!(resolver.summary().broken_links, 2);
    }

    #[test]
    fn test_later_success_not_shadowed() {
        let mut map = AncestorMap::new();
        map.insert_entry(700, 999, "Late");
        let resolver = PathResolver::new(&map, drive_c());
        assert!(resolver.resolve(700, "a").contains(UNKNOWN_PARENT_DIR));

        // The missing ancestor becomes known through another route
        map.insert_resolved(999, "C:\\Found");
        let resolver = PathResolver::new(&map, drive_c());
        assert_eq!(resolver.resolve(700, "a"), "C:\\Found\\Late\\a");
    }

    #[test]
    fn test_depth_bound() {
        let mut map = AncestorMap::new();
        // 1000 -> 1001 -> ... -> 1300 -> root
        for frn in 1000..1300 {
            map.insert_entry(frn, frn + 1, format!("d{}", frn));
        }
        map.insert_entry(1300, 5, "top");

        let resolver = PathResolver::new(&map, drive_c());
        assert_eq!(
            resolver.resolve_with_origin(1000, "deep.txt").1,
            PathOrigin::Unresolved(ClimbFailure::DepthExceeded)
        );

        let resolver = PathResolver::new(&map, drive_c()).with_max_depth(512);
        let (path, origin) = resolver.resolve_with_origin(1000, "deep.txt");
        assert_eq!(origin, PathOrigin::Climbed);
        assert!(path.starts_with("C:\\top\\d1299\\"));
        assert!(path.ends_with("\\d1000\\deep.txt"));
    }

    #[test]
    fn test_trailing_separator_not_doubled() {
        let map = AncestorMap::new();
        map.insert_resolved(77, "E:\\");
        map.insert_resolved(78, "E:\\Share\\");
        let resolver = PathResolver::new(&map, Drive::new('E').unwrap());

        assert_eq!(resolver.resolve(77, "a.txt"), "E:\\a.txt");
        assert_eq!(resolver.resolve(78, "a.txt"), "E:\\Share\\a.txt");
    }

    #[test]
    fn test_placeholder_parent_is_extended() {
        let map = AncestorMap::new();
        map.insert_resolved(90, "C:\\UNKNOWN_MFT_PARENT\\Lost");
        let resolver = PathResolver::new(&map, drive_c());

        let (path, origin) = resolver.resolve_with_origin(90, "kid.txt");
        assert_eq!(path, "C:\\UNKNOWN_MFT_PARENT\\Lost\\kid.txt");
        assert_eq!(origin, PathOrigin::Cached);
    }

    #[test]
    fn test_empty_cached_path_is_ignored() {
        let mut map = docs_tree();
        map.insert_entry(300, 200, "Deeper");
        map.insert_resolved(200, "");
        let resolver = PathResolver::new(&map, drive_c());

        assert_eq!(resolver.resolve(300, "f"), "C:\\Docs\\Sub\\Deeper\\f");
    }
}
