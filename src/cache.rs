//! In-memory cache of the latest report per host.
//!
//! The cache is the single source of truth for "is this host known / still
//! running". It is shared by cloning the handle; every clone sees the same
//! map. Reads never wait on each other, writes replace a whole [`Report`]
//! at once so a reader never observes a half-applied update.
//!
//! # Example
//!
//! ```
//! use sslcheck::cache::ReportCache;
//! use sslcheck::model::{Report, ReportStatus};
//!
//! let cache = ReportCache::new();
//! assert!(cache.get("example.com").is_none());
//!
//! cache.put("example.com", Report::new("example.com", ReportStatus::Dns));
//! cache.put("example.com", Report::new("example.com", ReportStatus::Ready));
//!
//! assert_eq!(cache.get("example.com").unwrap().status, ReportStatus::Ready);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::Report;

/// Host → latest report map, keyed by the host exactly as given.
pub type Snapshot = HashMap<String, Report>;

#[derive(Debug, Clone, Default)]
pub struct ReportCache {
    reports: Arc<RwLock<Snapshot>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated with a previously saved snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            reports: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Returns the latest report for `host`, if any.
    pub fn get(&self, host: &str) -> Option<Report> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// Stores `report` for `host`, replacing whatever was there.
    pub fn put(&self, host: impl Into<String>, report: Report) {
        self.reports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.into(), report);
    }

    /// Copy of the whole map at one instant.
    pub fn snapshot(&self) -> Snapshot {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the whole content, used when restoring persisted state.
    pub fn restore(&self, snapshot: Snapshot) {
        *self.reports.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn contains(&self, host: &str) -> bool {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(host)
    }

    /// Known hosts, sorted.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        hosts.sort();
        hosts
    }

    pub fn len(&self) -> usize {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, ReportStatus};

    fn report(host: &str, status: ReportStatus) -> Report {
        Report::new(host, status)
    }

    #[test]
    fn test_unknown_host_is_absent() {
        let cache = ReportCache::new();
        assert!(cache.get("never-analyzed.example").is_none());
        assert!(!cache.contains("never-analyzed.example"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_write_wins_without_merge() {
        let cache = ReportCache::new();

        let mut first = report("example.com", ReportStatus::InProgress);
        first.endpoints.push(Endpoint {
            ip_address: "10.0.0.1".into(),
            ..Default::default()
        });
        let second = report("example.com", ReportStatus::Ready);

        cache.put("example.com", first);
        cache.put("example.com", second.clone());

        let stored = cache.get("example.com").unwrap();
        assert_eq!(stored, second);
        assert!(stored.endpoints.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_host_key_is_not_normalized() {
        let cache = ReportCache::new();
        cache.put("Example.com", report("Example.com", ReportStatus::Ready));
        assert!(cache.get("example.com").is_none());
        assert!(cache.get("Example.com").is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let cache = ReportCache::new();
        let other = cache.clone();
        other.put("a.example", report("a.example", ReportStatus::Dns));
        assert!(cache.contains("a.example"));
    }

    #[test]
    fn test_snapshot_and_restore() {
        let cache = ReportCache::new();
        cache.put("b.example", report("b.example", ReportStatus::Ready));
        cache.put("a.example", report("a.example", ReportStatus::Dns));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(cache.hosts(), vec!["a.example", "b.example"]);

        let restored = ReportCache::new();
        restored.restore(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(ReportCache::from_snapshot(snapshot).len(), 2);
    }

    #[test]
    fn test_concurrent_writers_on_distinct_hosts() {
        let cache = ReportCache::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let host = format!("host{}.example", i);
                    for _ in 0..50 {
                        cache.put(host.clone(), Report::new(host.clone(), ReportStatus::InProgress));
                        let _ = cache.snapshot();
                    }
                    cache.put(host.clone(), Report::new(host, ReportStatus::Ready));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 8);
        assert!(cache
            .snapshot()
            .values()
            .all(|r| r.status == ReportStatus::Ready));
    }
}
