use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::AnnotationError;

/// Read-only access to annotation sources.
///
/// Parsers never touch the filesystem directly. Directory listings and file
/// contents come through this trait so lookup logic can run against
/// in-memory fixtures.
pub trait AnnotationStore: Send + Sync {
    /// Entries of `dir`, sorted. Hidden entries (leading `.`) are not listed.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStore;

impl AnnotationStore for FsStore {
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AnnotationError::io(format!(
                "failed to list annotation directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                AnnotationError::io(format!("failed to read entry in {}: {}", dir.display(), e))
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnnotationError::io(format!(
                "failed to read annotations {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(raw)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

/// In-memory store for tests and for callers that already hold annotation text.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file. Its parent directory becomes listable.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Result<()> {
        let path = path.into();
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        if let Some(parent) = path.parent() {
            state.dirs.insert(parent.to_path_buf());
        }
        state.files.insert(path, contents.into());
        Ok(())
    }

    /// Register an empty directory.
    pub fn add_dir(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        state.dirs.insert(dir.into());
        Ok(())
    }
}

impl AnnotationStore for MemoryStore {
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        if !state.dirs.contains(dir) {
            return Err(AnnotationError::io(format!(
                "failed to list annotation directory {}: not found",
                dir.display()
            ))
            .into());
        }
        Ok(state
            .files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter(|path| {
                !path
                    .file_name()
                    .map(|name| name.to_string_lossy().starts_with('.'))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| {
                AnnotationError::io(format!(
                    "failed to read annotations {}: not found",
                    path.display()
                ))
                .into()
            })
    }
}
