//! Background migration of legacy flat log files.
//!
//! Older deployments kept every content log directly in the log root. The
//! sweep moves each such file to its shard path, one file per lock
//! acquisition so request traffic interleaves with it.
//!
//! # State Transitions
//! ```text
//! Running → Complete: a pass finds nothing left to move
//! Running → Abandoned: max_passes passes still left files behind
//! ```
//! Neither transition is ever reversed. While the state is not `Complete`,
//! appends keep pulling the migration of their own content id.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::schema::MigrationConfig;
use crate::content::id::ContentId;
use crate::content::shard::{shard_path, LOG_EXTENSION, SHARD_THRESHOLD};
use crate::content::store::{ContentLogStore, MigrationOutcome};
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Legacy files may still exist.
    Running,
    /// Every legacy file has been moved.
    Complete,
    /// The sweep gave up; appends keep migrating on demand.
    Abandoned,
}

impl MigrationState {
    pub fn is_finished(self) -> bool {
        self != MigrationState::Running
    }
}

/// Counts from one pass over the log root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub moved: usize,
    pub failed: usize,
    pub remaining: usize,
}

/// The per-resource sweep task.
pub struct MigrationSweep {
    store: Arc<ContentLogStore>,
    config: MigrationConfig,
    conflicts: Mutex<HashSet<ContentId>>,
}

impl MigrationSweep {
    pub fn new(store: Arc<ContentLogStore>, config: MigrationConfig) -> Self {
        Self {
            store,
            config,
            conflicts: Mutex::new(HashSet::new()),
        }
    }

    /// Legacy files directly in the root that can still be moved.
    ///
    /// Skips ids short enough to already sit at their shard path, the
    /// resource's own shared logs, and files whose shard target exists.
    pub fn eligible(&self) -> io::Result<Vec<ContentId>> {
        let root = self.store.root();
        let resource = self.store.resource();
        let mut ids = Vec::new();

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.chars().count() <= SHARD_THRESHOLD || stem.starts_with(resource) {
                continue;
            }
            let Ok(id) = ContentId::new(stem) else {
                continue;
            };
            if shard_path(root, &id).exists() {
                self.report_conflict(&id);
                continue;
            }
            ids.push(id);
        }

        Ok(ids)
    }

    /// Try to move every eligible file once. Blocking.
    pub fn run_pass(&self) -> PassReport {
        let trace = self.store.trace();
        let ids = match self.eligible() {
            Ok(ids) => ids,
            Err(e) => {
                trace.trace(&format!("Migration Error listing {}: {}", self.store.root().display(), e));
                return PassReport { remaining: 1, ..PassReport::default() };
            }
        };
        if ids.is_empty() {
            return PassReport::default();
        }

        trace.trace("Migration Run Starting");
        let mut report = PassReport::default();
        for id in &ids {
            match self.store.migrate_if_needed(id) {
                MigrationOutcome::Moved => report.moved += 1,
                MigrationOutcome::Failed => report.failed += 1,
                MigrationOutcome::AlreadyMigrated | MigrationOutcome::NoLegacyFile => {}
            }
        }
        trace.trace("Migration Run Completed");

        report.remaining = self.eligible().map(|ids| ids.len()).unwrap_or(1);
        report
    }

    /// Sweep until nothing is left, the pass budget runs out, or shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> MigrationState {
        let sweep = Arc::new(self);
        let store = sweep.store.clone();
        let resource = store.resource().to_string();

        for pass in 1..=sweep.config.max_passes.max(1) {
            let worker = sweep.clone();
            let report = match tokio::task::spawn_blocking(move || worker.run_pass()).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(resource = %resource, error = %e, "Migration pass panicked");
                    break;
                }
            };

            tracing::debug!(
                resource = %resource,
                pass,
                moved = report.moved,
                failed = report.failed,
                remaining = report.remaining,
                "Migration pass finished"
            );

            if report.remaining == 0 {
                store.trace().trace("Migration Completed or Unnecessary");
                store.set_migration_state(MigrationState::Complete);
                return MigrationState::Complete;
            }

            let delay = calculate_backoff(pass, sweep.config.base_delay_ms, sweep.config.max_delay_ms);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(resource = %resource, "Migration interrupted by shutdown");
                    return store.migration_state();
                }
            }
        }

        store.trace().trace("Migration Abandoned, remaining files migrate on write");
        tracing::warn!(resource = %resource, "Log migration gave up with files left behind");
        store.set_migration_state(MigrationState::Abandoned);
        MigrationState::Abandoned
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<MigrationState> {
        tokio::spawn(self.run(shutdown))
    }

    fn report_conflict(&self, id: &ContentId) {
        let mut conflicts = self.conflicts.lock().unwrap_or_else(PoisonError::into_inner);
        if conflicts.insert(id.clone()) {
            self.store.trace().trace(&format!(
                "Legacy log for {} left in place, {} already exists",
                id,
                shard_path(self.store.root(), id).display()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedLogMode;
    use crate::lifecycle::Shutdown;
    use crate::observability::TraceSink;
    use crate::resilience::retries::RetryPolicy;
    use std::path::Path;
    use std::time::Duration;

    fn open_store(root: &Path, trace: TraceSink) -> Arc<ContentLogStore> {
        Arc::new(
            ContentLogStore::open(
                root,
                "widgets",
                SharedLogMode::Daily,
                RetryPolicy::new(0, Duration::from_millis(1)),
                trace,
                MigrationState::Running,
            )
            .unwrap(),
        )
    }

    fn quick_config(max_passes: u32) -> MigrationConfig {
        MigrationConfig {
            enabled: true,
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_passes,
        }
    }

    #[tokio::test]
    async fn sweep_moves_legacy_files_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("abcdefgh1.log"), "a\n").unwrap();
        fs::write(root.join("123456789012.log"), "b\n").unwrap();
        fs::write(root.join("42.log"), "short\n").unwrap();
        fs::write(root.join("widgets_20240309.log"), "shared\n").unwrap();
        fs::write(root.join("notes-about-it.txt"), "").unwrap();

        let store = open_store(root, TraceSink::noop());
        let mut done = store.subscribe_migration();
        let shutdown = Shutdown::new();

        let state = MigrationSweep::new(store.clone(), quick_config(5))
            .run(shutdown.subscribe())
            .await;

        assert_eq!(state, MigrationState::Complete);
        assert_eq!(store.migration_state(), MigrationState::Complete);
        assert!(done.wait_for(|s| s.is_finished()).await.is_ok());

        assert!(!root.join("abcdefgh1.log").exists());
        assert_eq!(fs::read_to_string(root.join("ab/abcd/abcdefgh1.log")).unwrap(), "a\n");
        assert_eq!(fs::read_to_string(root.join("12/1234/123456789012.log")).unwrap(), "b\n");
        assert!(root.join("42.log").exists());
        assert!(root.join("widgets_20240309.log").exists());
        assert!(root.join("notes-about-it.txt").exists());
    }

    #[tokio::test]
    async fn empty_root_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path(), TraceSink::noop());
        let shutdown = Shutdown::new();

        let state = MigrationSweep::new(store, quick_config(1)).run(shutdown.subscribe()).await;
        assert_eq!(state, MigrationState::Complete);
    }

    #[tokio::test]
    async fn existing_targets_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("ab/abcd")).unwrap();
        fs::write(root.join("ab/abcd/abcdefgh1.log"), "new\n").unwrap();
        fs::write(root.join("abcdefgh1.log"), "old\n").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let store = open_store(root, TraceSink::new(move |m| captured.lock().unwrap().push(m.to_string())));
        let sweep = MigrationSweep::new(store, quick_config(3));

        assert!(sweep.eligible().unwrap().is_empty());
        assert!(sweep.eligible().unwrap().is_empty());
        let conflicts = seen.lock().unwrap().iter().filter(|m| m.contains("left in place")).count();
        assert_eq!(conflicts, 1);

        let shutdown = Shutdown::new();
        assert_eq!(sweep.run(shutdown.subscribe()).await, MigrationState::Complete);
        assert!(root.join("abcdefgh1.log").exists());
    }

    #[tokio::test]
    async fn permanent_failures_are_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // a plain file blocks creation of the shard directory
        fs::write(root.join("ab"), "").unwrap();
        fs::write(root.join("abcdefgh1.log"), "old\n").unwrap();

        let store = open_store(root, TraceSink::noop());
        let shutdown = Shutdown::new();
        let sweep = MigrationSweep::new(store.clone(), quick_config(3));

        let report = sweep.run_pass();
        assert_eq!(report, PassReport { moved: 0, failed: 1, remaining: 1 });

        assert_eq!(sweep.run(shutdown.subscribe()).await, MigrationState::Abandoned);
        assert_eq!(store.migration_state(), MigrationState::Abandoned);
        assert!(root.join("abcdefgh1.log").exists());
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("ab"), "").unwrap();
        fs::write(root.join("abcdefgh1.log"), "old\n").unwrap();

        let store = open_store(root, TraceSink::noop());
        let shutdown = Shutdown::new();
        let config = MigrationConfig {
            enabled: true,
            base_delay_ms: 60_000,
            max_delay_ms: 60_000,
            max_passes: 10,
        };
        let handle = MigrationSweep::new(store, config).spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();

        let state = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(state, MigrationState::Running);
    }
}
