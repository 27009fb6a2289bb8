//! Durable task set.
//!
//! The store is a pretty-printed JSON array, read in full and rewritten in
//! full. Writes go to a temporary file in the same directory which is then
//! renamed over the store, so readers never see a partial file. A sibling
//! `.lock` file guards read-modify-write cycles across processes.

use crate::error::{MonitorError, Result};
use crate::task::MonitoringTask;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Lock files older than this are assumed to belong to a dead process.
const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
    stale_lock_after: Duration,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_lock_after: DEFAULT_STALE_LOCK_AFTER,
        }
    }

    pub fn with_stale_lock_after(mut self, after: Duration) -> Self {
        self.stale_lock_after = after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".lock");
        PathBuf::from(p)
    }

    fn io_err(&self, source: std::io::Error) -> MonitorError {
        MonitorError::StoreIo {
            path: self.path.clone(),
            source,
        }
    }

    /// Read every task. A missing store file is an empty task set.
    pub fn load(&self) -> Result<Vec<MonitoringTask>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "task store missing, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tasks: Vec<MonitoringTask> =
            serde_json::from_str(&content).map_err(|source| MonitorError::StoreFormat {
                path: self.path.clone(),
                source,
            })?;
        ensure_unique(&tasks)?;
        Ok(tasks)
    }

    /// Atomically replace the stored task set.
    pub fn save(&self, tasks: &[MonitoringTask]) -> Result<()> {
        ensure_unique(tasks)?;
        let json = serde_json::to_string_pretty(tasks)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.io_err(e))?;
        tmp.write_all(b"\n").map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        debug!(path = %self.path.display(), tasks = tasks.len(), "task store written");
        Ok(())
    }

    /// Take the store lock for a read-modify-write cycle.
    ///
    /// Fails with [`MonitorError::StoreLocked`] while another holder is
    /// active. A lock file older than the stale threshold is taken over.
    pub fn lock(&self) -> Result<StoreLock> {
        let path = self.lock_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // pid is informational only
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(StoreLock { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt == 0 => {
                    if !self.is_stale(&path) {
                        return Err(MonitorError::StoreLocked { path });
                    }
                    warn!(path = %path.display(), "removing stale task store lock");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(self.io_err(e)),
                    }
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(MonitorError::StoreLocked { path });
                }
                Err(e) => return Err(self.io_err(e)),
            }
        }
        Err(MonitorError::StoreLocked { path })
    }

    fn is_stale(&self, lock: &Path) -> bool {
        fs::metadata(lock)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > self.stale_lock_after)
    }

    /// Register a new task. Fails on a duplicate `aoi_id` or invalid task.
    pub fn add(&self, task: MonitoringTask) -> Result<()> {
        task.validate()?;
        let _lock = self.lock()?;
        let mut tasks = self.load()?;
        if tasks.iter().any(|t| t.aoi_id == task.aoi_id) {
            return Err(MonitorError::DuplicateTask(task.aoi_id));
        }
        tasks.push(task);
        self.save(&tasks)
    }

    /// Remove a task by id, returning it.
    pub fn remove(&self, aoi_id: &str) -> Result<MonitoringTask> {
        let _lock = self.lock()?;
        let mut tasks = self.load()?;
        let idx = tasks
            .iter()
            .position(|t| t.aoi_id == aoi_id)
            .ok_or_else(|| MonitorError::TaskNotFound(aoi_id.to_string()))?;
        let removed = tasks.remove(idx);
        self.save(&tasks)?;
        Ok(removed)
    }

    /// Remove every task, returning how many there were.
    pub fn clear(&self) -> Result<usize> {
        let _lock = self.lock()?;
        let count = self.load()?.len();
        self.save(&[])?;
        Ok(count)
    }
}

fn ensure_unique(tasks: &[MonitoringTask]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.aoi_id.as_str()) {
            return Err(MonitorError::DuplicateTask(task.aoi_id.clone()));
        }
    }
    Ok(())
}

/// Held store lock; the lock file is removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release task store lock");
        }
    }
}
