//! Durable checkpoints of the report cache.
//!
//! A checkpoint is the whole cache written as one pretty-printed JSON object
//! (host → report). Each save overwrites the previous artifact. Neither
//! saving nor loading ever fails the caller: problems are logged and the
//! in-memory state stays authoritative.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cache::Snapshot;

/// Load/save contract between the cache and durable storage.
pub trait ReportStore: Send + Sync {
    /// Writes the full snapshot, replacing any earlier artifact.
    fn save(&self, snapshot: &Snapshot);

    /// Reads the last artifact; empty when there is none or it is unreadable.
    fn load(&self) -> Snapshot;
}

/// Stores checkpoints in a single JSON file.
///
/// Saves through one store (or its clones) are serialized.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the artifact. Missing files are not an error.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("removing {}", self.path.display()))?;
        }
        Ok(())
    }

    fn try_save(&self, snapshot: &Snapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        // Uniquely named sibling, renamed over the target: readers never see
        // a torn file and concurrent writers never share a temp path.
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn try_load(&self) -> Result<Snapshot> {
        let content = fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }
}

impl ReportStore for JsonFileStore {
    fn save(&self, snapshot: &Snapshot) {
        match self.try_save(snapshot) {
            Ok(()) => info!(
                path = %self.path.display(),
                hosts = snapshot.len(),
                "scan results saved"
            ),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to save scan results"),
        }
    }

    fn load(&self) -> Snapshot {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved scan results");
            return Snapshot::new();
        }

        match self.try_load() {
            Ok(snapshot) => {
                info!(
                    path = %self.path.display(),
                    hosts = snapshot.len(),
                    "loaded saved scan results"
                );
                snapshot
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable scan results");
                Snapshot::new()
            }
        }
    }
}

/// Keeps the last checkpoint in memory. Used when persistence is disabled
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Snapshot>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints taken so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_saved(&self) -> Option<Snapshot> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ReportStore for MemoryStore {
    fn save(&self, snapshot: &Snapshot) {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    fn load(&self) -> Snapshot {
        self.last_saved().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CertChain, Certificate, Endpoint, EndpointDetails, Report, ReportStatus};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut ready = Report::new("example.com", ReportStatus::Ready);
        ready.start_time = 1_700_000_000_000;
        ready.test_time = 1_700_000_090_000;
        ready.endpoints.push(Endpoint {
            ip_address: "93.184.216.34".into(),
            grade: "A".into(),
            details: EndpointDetails {
                cert_chains: vec![CertChain {
                    id: "chain".into(),
                    cert_ids: vec!["c1".into()],
                }],
                ..Default::default()
            },
            ..Default::default()
        });
        ready.certs.push(Certificate {
            id: "c1".into(),
            subject: "CN=example.com".into(),
            key_alg: "RSA".into(),
            key_size: 2048,
            ..Default::default()
        });

        let mut failed = Report::new("bad.example", ReportStatus::InProgress);
        failed.status_message = Some("Resolving domain names".into());

        let mut snapshot = Snapshot::new();
        snapshot.insert("example.com".into(), ready);
        snapshot.insert("bad.example".into(), failed);
        snapshot
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("scans_db.json"));
        let snapshot = sample_snapshot();

        store.save(&snapshot);
        let loaded = store.load();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("scans_db.json"));

        store.save(&sample_snapshot());
        store.save(&Snapshot::new());

        assert!(store.load().is_empty());
    }

    #[test]
    fn test_artifact_is_indented_host_mapping() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("scans_db.json"));
        store.save(&sample_snapshot());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"example.com\": {"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["example.com"]["status"], "READY");
    }

    #[test]
    fn test_missing_artifact_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_artifact_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scans_db.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_clear_removes_artifact() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("scans_db.json"));
        store.save(&sample_snapshot());

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_concurrent_saves_all_succeed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("scans_db.json")));
        let snapshot = sample_snapshot();

        for _ in 0..30 {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let snapshot = snapshot.clone();
                    std::thread::spawn(move || store.try_save(&snapshot).is_ok())
                })
                .collect();
            for worker in workers {
                assert!(worker.join().unwrap());
            }
        }

        assert_eq!(store.load(), snapshot);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        assert!(store.load().is_empty());

        store.save(&sample_snapshot());
        store.save(&sample_snapshot());

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load().len(), 2);
    }
}
