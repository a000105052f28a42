//! Content log store.
//!
//! # Responsibilities
//! - Map a content id to its shard file and create directories lazily
//! - Pull the migration of a content id's legacy file before writing to it
//! - Append lines with bounded retry, to the shard file and the shared file
//!
//! # Design Decisions
//! - All blocking: callers run it on `spawn_blocking`
//! - A single mutex per resource serializes check-migrate-append and the sweep
//! - The mutex also guards the cache of directories already created

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::config::{ResourceBinding, SharedLogMode};
use crate::content::id::ContentId;
use crate::content::migration::MigrationState;
use crate::content::shard::{legacy_path, shard_dir, shard_path};
use crate::observability::{metrics, TraceSink};
use crate::resilience::retries::{retry_blocking, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create log root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a single migration attempt for one content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The shard file already exists; nothing to do.
    AlreadyMigrated,
    /// No legacy file to move.
    NoLegacyFile,
    /// The legacy file now lives at its shard path.
    Moved,
    /// Moving failed; reported and left for the next attempt.
    Failed,
}

#[derive(Debug, Default)]
struct StoreState {
    known_dirs: HashSet<PathBuf>,
}

/// Append-only transaction log files for one resource.
#[derive(Debug)]
pub struct ContentLogStore {
    root: PathBuf,
    resource: String,
    shared_log: SharedLogMode,
    retry: RetryPolicy,
    trace: TraceSink,
    migration: watch::Sender<MigrationState>,
    state: Mutex<StoreState>,
}

impl ContentLogStore {
    /// Open (creating if needed) the log root for `resource`.
    ///
    /// `migration` is the initial state: `Running` makes every append check
    /// for a legacy file until the sweep reports `Complete`.
    pub fn open(
        root: impl Into<PathBuf>,
        resource: impl Into<String>,
        shared_log: SharedLogMode,
        retry: RetryPolicy,
        trace: TraceSink,
        migration: MigrationState,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::CreateRoot {
            path: root.clone(),
            source,
        })?;

        let mut state = StoreState::default();
        state.known_dirs.insert(root.clone());

        Ok(Self {
            root,
            resource: resource.into(),
            shared_log,
            retry,
            trace,
            migration: watch::Sender::new(migration),
            state: Mutex::new(state),
        })
    }

    pub fn from_binding(
        binding: &ResourceBinding,
        trace: TraceSink,
        migration: MigrationState,
    ) -> Result<Self, StoreError> {
        Self::open(
            &binding.log_root,
            &binding.resource_name,
            binding.shared_log,
            binding.write_retry,
            trace,
            migration,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn trace(&self) -> &TraceSink {
        &self.trace
    }

    pub fn migration_state(&self) -> MigrationState {
        *self.migration.borrow()
    }

    /// Completion signal of the background sweep.
    pub fn subscribe_migration(&self) -> watch::Receiver<MigrationState> {
        self.migration.subscribe()
    }

    pub(crate) fn set_migration_state(&self, state: MigrationState) {
        self.migration.send_replace(state);
    }

    /// Shard file of `id`. Does not touch the filesystem.
    pub fn path_for(&self, id: &ContentId) -> PathBuf {
        shard_path(&self.root, id)
    }

    /// Secondary file a line written at `at` also goes to.
    pub fn shared_log_path(&self, at: DateTime<Utc>) -> Option<PathBuf> {
        match self.shared_log {
            SharedLogMode::Daily => Some(
                self.root
                    .join(format!("{}_{}.log", self.resource, at.format("%Y%m%d"))),
            ),
            SharedLogMode::Flat => Some(self.root.join(format!("{}.log", self.resource))),
            SharedLogMode::None => None,
        }
    }

    /// Move the legacy flat file of `id` to its shard path, if there is one
    /// and the shard file doesn't exist yet.
    pub fn migrate_if_needed(&self, id: &ContentId) -> MigrationOutcome {
        let mut state = self.lock();
        self.migrate_locked(&mut state, id)
    }

    /// Append `line` for `id` (and to the shared file, if configured).
    ///
    /// Returns false when a write was dropped after exhausting its retries.
    /// The failure has already been reported; callers may ignore it.
    pub fn append(&self, id: Option<&ContentId>, line: &str, at: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        let mut written = true;
        let mut shard = None;

        if let Some(id) = id {
            if self.migration_state() != MigrationState::Complete {
                self.migrate_locked(&mut state, id);
            }
            let dir = shard_dir(&self.root, id);
            let path = shard_path(&self.root, id);
            written &= self.write_with_retry(&mut state, &dir, &path, line);
            shard = Some(path);
        }

        if let Some(path) = self.shared_log_path(at) {
            // an id named like the shared log already wrote there
            if shard.as_ref() != Some(&path) {
                let root = self.root.clone();
                written &= self.write_with_retry(&mut state, &root, &path, line);
            }
        }

        written
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate_locked(&self, state: &mut StoreState, id: &ContentId) -> MigrationOutcome {
        let target = shard_path(&self.root, id);
        if target.exists() {
            return MigrationOutcome::AlreadyMigrated;
        }
        let legacy = legacy_path(&self.root, id);
        if legacy == target || is_shared_log_stem(&self.resource, id.as_str()) || !legacy.exists() {
            return MigrationOutcome::NoLegacyFile;
        }

        let dir = shard_dir(&self.root, id);
        match ensure_dir(state, &dir).and_then(|_| fs::rename(&legacy, &target)) {
            Ok(()) => {
                self.trace.trace(&format!("Migrated {}", legacy.display()));
                metrics::record_migrated(&self.resource);
                MigrationOutcome::Moved
            }
            Err(e) => {
                state.known_dirs.remove(&dir);
                self.trace.trace(&format!(
                    "Couldn't move old log to new log {}: {}",
                    target.display(),
                    e
                ));
                tracing::warn!(
                    resource = %self.resource,
                    content_id = %id,
                    error = %e,
                    "Log migration failed"
                );
                MigrationOutcome::Failed
            }
        }
    }

    fn write_with_retry(&self, state: &mut StoreState, dir: &Path, path: &Path, line: &str) -> bool {
        let result = retry_blocking(self.retry, || {
            ensure_dir(state, dir)?;
            append_line(path, line).map_err(|e| {
                // the directory may have been removed behind our back
                state.known_dirs.remove(dir);
                e
            })
        });

        match result {
            Ok(()) => true,
            Err(e) => {
                self.trace.trace(&format!("Failed to write {}: {}", path.display(), e));
                tracing::warn!(
                    resource = %self.resource,
                    path = %path.display(),
                    attempts = self.retry.attempts(),
                    error = %e,
                    "Dropping transaction log line"
                );
                metrics::record_log_write_failure(&self.resource);
                false
            }
        }
    }
}

/// `{resource}` or `{resource}_yyyyMMdd`: a file stem the shared log uses.
pub(crate) fn is_shared_log_stem(resource: &str, stem: &str) -> bool {
    match stem.strip_prefix(resource) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('_')
            .is_some_and(|day| day.len() == 8 && day.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

fn ensure_dir(state: &mut StoreState, dir: &Path) -> io::Result<()> {
    if state.known_dirs.contains(dir) {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    state.known_dirs.insert(dir.to_path_buf());
    Ok(())
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
}
