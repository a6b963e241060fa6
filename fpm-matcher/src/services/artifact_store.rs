//! Transient artifact store
//!
//! Every artifact-producing operation gets its own namespace in a shared root
//! directory. Namespace ids combine a caller label with a process-wide counter
//! and a random token, and the store refuses to hand out an id that is still
//! in flight, so concurrent requests can never overwrite each other's files.
//!
//! Namespaces are guards: dropping one deletes every file any stage could have
//! produced for it.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest label kept from a caller-supplied id
const MAX_LABEL_LEN: usize = 32;

/// Side outputs the detector writes next to its template
const DETECTOR_AUX_SUFFIXES: [&str; 7] = ["brw", "dm", "hcm", "lcm", "lfm", "min", "qm"];

/// Pipeline stage an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Normalized 8-bit grayscale raster
    Raster,
    /// WSQ-compressed encoding
    Compressed,
    /// Detector template output
    Template,
    /// First template handed to the matcher
    Probe,
    /// Second template handed to the matcher
    Gallery,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Raster,
        Stage::Compressed,
        Stage::Template,
        Stage::Probe,
        Stage::Gallery,
    ];

    /// File suffix (without leading dot)
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::Raster => "raw",
            Stage::Compressed => "wsq",
            Stage::Template => "xyt",
            Stage::Probe => "probe.xyt",
            Stage::Gallery => "gallery.xyt",
        }
    }
}

/// Shared artifact root plus the set of in-flight namespace ids
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    counter: AtomicU64,
    in_flight: Mutex<HashSet<String>>,
}

impl ArtifactStore {
    /// Open the store, creating the root directory if missing
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Arc<Self>> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Arc::new(Self {
            root,
            counter: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh namespace for one operation
    ///
    /// `label` is only used to make artifact names readable; uniqueness comes
    /// from the counter and the random token.
    pub fn allocate(self: &Arc<Self>, label: &str) -> ArtifactNamespace {
        let label = sanitize_label(label);
        loop {
            let seq = self.counter.fetch_add(1, Ordering::Relaxed);
            let token = Uuid::new_v4().simple().to_string();
            let id = format!("{}-{}-{}", label, seq, &token[..12]);

            if self.claim(&id) {
                debug!(namespace = %id, "Allocated artifact namespace");
                return ArtifactNamespace {
                    store: Arc::clone(self),
                    id,
                    released: false,
                };
            }
        }
    }

    /// Path of the artifact for `stage` in namespace `id`
    pub fn path(&self, id: &str, stage: Stage) -> PathBuf {
        self.root.join(format!("{}.{}", id, stage.suffix()))
    }

    /// Prefix (no extension) under which tools derive their output names
    pub fn prefix(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Number of namespaces currently allocated and not yet released
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn claim(&self, id: &str) -> bool {
        self.lock_in_flight().insert(id.to_string())
    }

    fn unclaim(&self, id: &str) {
        self.lock_in_flight().remove(id);
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding this lock leaves the set itself consistent.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delete every file that any stage could have produced for `id`
    ///
    /// Absent files count as success, so this is idempotent. Other removal
    /// errors are logged and swallowed; cleanup never fails an operation.
    pub fn release_files(&self, id: &str) {
        let stage_paths = Stage::ALL.iter().map(|stage| self.path(id, *stage));
        let aux_paths = DETECTOR_AUX_SUFFIXES
            .iter()
            .map(|suffix| self.root.join(format!("{}.{}", id, suffix)));

        for path in stage_paths.chain(aux_paths) {
            remove_if_present(&path);
        }
    }
}

/// Remove one file, treating "not found" as success
pub fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
    }
}

/// One operation's artifact namespace
///
/// Released (files deleted, id returned) on drop or by an explicit
/// [`ArtifactNamespace::release`].
#[derive(Debug)]
pub struct ArtifactNamespace {
    store: Arc<ArtifactStore>,
    id: String,
    released: bool,
}

impl ArtifactNamespace {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        self.store.path(&self.id, stage)
    }

    pub fn prefix(&self) -> PathBuf {
        self.store.prefix(&self.id)
    }

    /// Delete all artifacts of this namespace; safe to call repeatedly
    pub fn release(&mut self) {
        self.store.release_files(&self.id);
        if !self.released {
            self.store.unclaim(&self.id);
            self.released = true;
            debug!(namespace = %self.id, "Released artifact namespace");
        }
    }
}

impl Drop for ArtifactNamespace {
    fn drop(&mut self) {
        self.release();
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_LABEL_LEN)
        .collect();

    if cleaned.is_empty() {
        "op".to_string()
    } else {
        cleaned
    }
}
