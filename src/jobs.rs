//! Background scans with pollable status.
//!
//! [`ScanQueue::submit`] returns as soon as the scan thread is started. The
//! returned [`ScanHandle`] (also retrievable by id) reports whether the scan
//! is still running, finished with a report, or failed. Scans run to
//! completion; there is no cancellation. Several scans may run at once: the
//! catalog's unique constraints keep concurrent ingestion of the same file
//! from producing duplicate rows.

use crate::scan::{ScanReport, Scanner};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRequest {
    All,
    /// A folder already present in the catalog, relative to the media root.
    Folder(String),
}

impl fmt::Display for ScanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanRequest::All => f.write_str("full scan"),
            ScanRequest::Folder(path) => write!(f, "folder scan of {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Running,
    Finished(ScanReport),
    Failed(String),
}

impl ScanState {
    pub fn is_done(&self) -> bool {
        !matches!(self, ScanState::Running)
    }
}

type Shared = Arc<(Mutex<ScanState>, Condvar)>;

/// Status handle of one submitted scan.
#[derive(Debug, Clone)]
pub struct ScanHandle {
    id: u64,
    request: ScanRequest,
    shared: Shared,
}

impl ScanHandle {
    fn new(id: u64, request: ScanRequest) -> Self {
        Self {
            id,
            request,
            shared: Arc::new((Mutex::new(ScanState::Running), Condvar::new())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ScanState {
        self.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_done()
    }

    /// Block until the scan is done.
    pub fn wait(&self) -> ScanState {
        let guard = self.lock();
        let guard = self
            .shared
            .1
            .wait_while(guard, |state| !state.is_done())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Block until the scan is done or `timeout` passes. `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ScanState> {
        let guard = self.lock();
        let (guard, _) = self
            .shared
            .1
            .wait_timeout_while(guard, timeout, |state| !state.is_done())
            .unwrap_or_else(PoisonError::into_inner);
        guard.is_done().then(|| guard.clone())
    }

    fn complete(&self, state: ScanState) {
        *self.lock() = state;
        self.shared.1.notify_all();
    }
}

/// Starts scans on background threads and tracks their status.
pub struct ScanQueue {
    scanner: Arc<Scanner>,
    next_id: AtomicU64,
    handles: DashMap<u64, ScanHandle>,
}

impl ScanQueue {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            next_id: AtomicU64::new(1),
            handles: DashMap::new(),
        }
    }

    /// Start a scan and return immediately.
    pub fn submit(&self, request: ScanRequest) -> ScanHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ScanHandle::new(id, request.clone());
        self.handles.insert(id, handle.clone());

        let scanner = Arc::clone(&self.scanner);
        let worker = handle.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("scan-{id}"))
            .spawn(move || {
                let result = match &worker.request {
                    ScanRequest::All => scanner.scan_all(),
                    ScanRequest::Folder(path) => scanner.scan_folder(path),
                };
                let state = match result {
                    Ok(report) => ScanState::Finished(report),
                    Err(e) => {
                        tracing::error!(scan = worker.id, request = %worker.request, error = %e, "scan failed");
                        ScanState::Failed(e.to_string())
                    }
                };
                worker.complete(state);
            });

        match spawned {
            Ok(_) => tracing::info!(scan = id, %request, "scan started"),
            Err(e) => {
                tracing::error!(scan = id, error = %e, "cannot start scan thread");
                handle.complete(ScanState::Failed(e.to_string()));
            }
        }
        handle
    }

    pub fn handle(&self, id: u64) -> Option<ScanHandle> {
        self.handles.get(&id).map(|h| h.clone())
    }

    pub fn status(&self, id: u64) -> Option<ScanState> {
        self.handle(id).map(|h| h.state())
    }

    /// Ids of scans still running.
    pub fn running(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .handles
            .iter()
            .filter(|h| !h.is_finished())
            .map(|h| *h.key())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, SqliteCatalog};
    use crate::config::ScanConfig;
    use crate::derivatives::{DerivativeCache, DerivativeSettings};
    use crate::imaging::backend::tests::MockBackend;
    use crate::metadata::MetadataCodec;
    use crate::test_helpers::write_test_jpeg;
    use std::path::Path;
    use tempfile::TempDir;

    fn queue(media: &Path) -> (ScanQueue, Arc<SqliteCatalog>) {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        let derivatives = Arc::new(
            DerivativeCache::new(
                media.join(".cache"),
                DerivativeSettings::default(),
                Arc::new(MockBackend::new()),
            )
            .unwrap(),
        );
        let scanner = Scanner::new(
            catalog.clone(),
            MetadataCodec::Builtin,
            derivatives,
            media,
            ScanConfig::default(),
        );
        (ScanQueue::new(Arc::new(scanner)), catalog)
    }

    #[test]
    fn submitted_scan_finishes_with_report() {
        let tmp = TempDir::new().unwrap();
        write_test_jpeg(&tmp.path().join("a.jpg"), 8, 8);
        let (queue, catalog) = queue(tmp.path());

        let handle = queue.submit(ScanRequest::All);
        let state = handle.wait();
        let ScanState::Finished(report) = state else {
            panic!("unexpected state {state:?}");
        };
        assert_eq!(report.added, 1);
        assert!(catalog.photo_exists("a.jpg").unwrap());
        assert_eq!(queue.status(handle.id()), Some(ScanState::Finished(report)));
        assert!(queue.running().is_empty());
    }

    #[test]
    fn failed_scan_is_observable() {
        let tmp = TempDir::new().unwrap();
        let (queue, _) = queue(tmp.path());

        let handle = queue.submit(ScanRequest::Folder("Nope".into()));
        match handle.wait_timeout(Duration::from_secs(30)) {
            Some(ScanState::Failed(msg)) => assert!(msg.contains("Nope")),
            other => panic!("unexpected state {other:?}"),
        }
        assert!(handle.is_finished());
    }

    #[test]
    fn ids_are_distinct_and_lookup_works() {
        let tmp = TempDir::new().unwrap();
        let (queue, _) = queue(tmp.path());
        let a = queue.submit(ScanRequest::All);
        let b = queue.submit(ScanRequest::All);
        assert_ne!(a.id(), b.id());
        a.wait();
        b.wait();
        assert_eq!(queue.handle(b.id()).unwrap().request(), &ScanRequest::All);
        assert_eq!(queue.status(999), None);
    }

    #[test]
    fn concurrent_scans_do_not_duplicate_rows() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            write_test_jpeg(&tmp.path().join(format!("{i}.jpg")), 8, 8);
        }
        let (queue, catalog) = queue(tmp.path());
        let handles: Vec<_> = (0..3).map(|_| queue.submit(ScanRequest::All)).collect();
        for h in &handles {
            assert!(matches!(h.wait(), ScanState::Finished(_)));
        }
        assert_eq!(catalog.counts().unwrap().photos, 5);
    }

    #[test]
    fn request_display() {
        assert_eq!(ScanRequest::All.to_string(), "full scan");
        assert_eq!(
            ScanRequest::Folder("Trips".into()).to_string(),
            "folder scan of Trips"
        );
    }
}
