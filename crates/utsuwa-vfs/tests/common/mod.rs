//! Shared setup for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use utsuwa_vfs::{BasePathFs, Fs, MemoryFs, OsFs};

/// Route `tracing` output through the test harness. `RUST_LOG` picks the
/// level; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn p(path: &str) -> &Path {
    Path::new(path)
}

/// A backend under test. Keeps the scratch directory of host-backed
/// filesystems alive for as long as the backend is in use.
pub struct Backend {
    pub fs: Arc<dyn Fs>,
    _dir: Option<TempDir>,
}

impl Backend {
    pub fn memory() -> Self {
        Self {
            fs: Arc::new(MemoryFs::new()),
            _dir: None,
        }
    }

    /// The host filesystem confined to a fresh temporary directory.
    pub fn host() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let fs = BasePathFs::new(Arc::new(OsFs::new()), dir.path());
        Self {
            fs: Arc::new(fs),
            _dir: Some(dir),
        }
    }
}

/// Run `check` against every backend that should behave identically.
pub fn each_backend(check: impl Fn(&dyn Fs)) {
    init_tracing();
    for backend in [Backend::memory(), Backend::host()] {
        tracing::debug!(backend = backend.fs.name(), "running check");
        check(backend.fs.as_ref());
    }
}
