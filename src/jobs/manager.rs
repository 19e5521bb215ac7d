use std::sync::{Arc, RwLock};

use crate::config::HooktrackSettings;
use super::handle::JobHandle;
use super::record::{HookInstaller, JobRecord, JobSnapshot, JobStatus, JobType};
use super::registry::{HistoryEntry, JobRegistry, JobStatistics};

/// Acquire a read lock, recovering from poisoned state.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

/// Acquire a write lock, recovering from poisoned state.
fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct ManagerShared {
    registry: RwLock<JobRegistry>,
}

impl ManagerShared {
    /// Hit recording entry point for handles. Status is re-checked inside
    /// the lock: a kill racing with an in-flight callback either lands
    /// before (hit dropped) or after (hit counted), never half-applied.
    pub(crate) fn record_hit(&self, id: u64, execution_time_ms: f64) {
        let mut registry = write_lock(&self.registry);
        if let Some(record) = registry.get_mut(id) {
            record.record_hit(execution_time_ms);
        }
    }
}

/// Lifecycle manager for instrumentation jobs. Cheap to clone; all clones
/// share one registry. This is the composition root: hook installers and
/// the operator console receive a clone instead of reaching for globals.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<ManagerShared>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::with_settings(&HooktrackSettings::default())
    }

    pub fn with_settings(settings: &HooktrackSettings) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                registry: RwLock::new(JobRegistry::new(settings.history_max_entries)),
            }),
        }
    }

    /// Register a job in `pending` state. The installer runs later, via
    /// [`JobManager::execute_job`]. Never fails.
    pub fn create_job(
        &self,
        job_type: JobType,
        target: impl Into<String>,
        options: serde_json::Map<String, serde_json::Value>,
        installer: HookInstaller,
    ) -> u64 {
        let mut registry = write_lock(&self.shared.registry);
        let id = registry.allocate();
        let record = JobRecord::new(id, job_type, target, options, installer);
        tracing::info!("job #{} create: {} ({})", id, record.target, job_type);
        registry.append_history(HistoryEntry::of(&record));
        registry.insert(record);
        id
    }

    pub(crate) fn insert_auto(&self, build: impl FnOnce(u64) -> JobRecord) -> u64 {
        let mut registry = write_lock(&self.shared.registry);
        let id = registry.allocate();
        let record = build(id);
        tracing::info!(
            "job #{} auto-register: {} ({})",
            id,
            record.target,
            record.job_type
        );
        registry.append_history(HistoryEntry::of(&record));
        registry.insert(record);
        id
    }

    /// The poll handle for a live job. Installers stash this inside their
    /// callbacks; it stays valid (and reads `cancelled`) after cleanup.
    pub fn handle(&self, id: u64) -> Option<JobHandle> {
        let registry = read_lock(&self.shared.registry);
        registry
            .get(id)
            .map(|r| JobHandle::new(id, r.status_cell(), Arc::downgrade(&self.shared)))
    }

    /// Run a pending job's installer. On success the returned resources are
    /// adopted and the job goes active. On error the job goes failed with
    /// the error recorded; no exception escapes.
    pub fn execute_job(&self, id: u64) -> bool {
        // Take the installer out under the lock, run it outside: installers
        // may call back into the manager (nested create, handle lookups).
        let (installer, handle) = {
            let mut registry = write_lock(&self.shared.registry);
            let Some(record) = registry.get_mut(id) else {
                tracing::warn!("job #{} execute: not found", id);
                return false;
            };
            if record.status() != JobStatus::Pending {
                tracing::warn!("job #{} execute: invalid from {}", id, record.status());
                return false;
            }
            let Some(installer) = record.take_installer() else {
                tracing::warn!("job #{} execute: no installer", id);
                return false;
            };
            let handle = JobHandle::new(id, record.status_cell(), Arc::downgrade(&self.shared));
            (installer, handle)
        };

        match installer(handle) {
            Ok(resources) => {
                let mut registry = write_lock(&self.shared.registry);
                let Some(record) = registry.get_mut(id) else {
                    tracing::warn!("job #{} execute: removed mid-install, releasing resources", id);
                    for action in resources {
                        let kind = action.kind();
                        if let Err(e) = action.release() {
                            tracing::warn!("job #{} release ({}): failed: {}", id, kind, e);
                        }
                    }
                    return false;
                };
                // A terminal transition may land while the installer runs:
                // cancel-from-pending is legal, and a fatal agent error can
                // fail the job before the installer returns. Drain what it
                // just installed instead of resurrecting the job.
                if record.status().is_terminal() {
                    record.adopt_resources(resources);
                    record.release_residual();
                    tracing::info!(
                        "job #{} execute: {} mid-install, resources released",
                        id,
                        record.status()
                    );
                    return false;
                }
                record.adopt_resources(resources);
                let ok = record.mark_active();
                if ok {
                    tracing::info!(
                        "job #{} execute: ok ({} resource(s))",
                        id,
                        record.resource_count()
                    );
                }
                ok
            }
            Err(e) => {
                let mut registry = write_lock(&self.shared.registry);
                if let Some(record) = registry.get_mut(id) {
                    record.fail(e.to_string());
                    registry.append_history_for(id);
                }
                tracing::warn!("job #{} execute: failed: {}", id, e);
                false
            }
        }
    }

    /// Cancel a job: drain its owned resources and mark it `cancelled`.
    /// The record stays in the live mapping so that installed callbacks
    /// polling their handle (or `get_job`) keep observing the cancellation;
    /// only [`JobManager::cleanup`] removes terminal records.
    pub fn kill_job(&self, id: u64) -> bool {
        let mut registry = write_lock(&self.shared.registry);
        let Some(record) = registry.get_mut(id) else {
            tracing::warn!("job #{} kill: not found", id);
            return false;
        };
        if !record.cancel() {
            tracing::warn!("job #{} kill: invalid from {}", id, record.status());
            return false;
        }
        tracing::info!("job #{} kill: ok", id);
        registry.append_history_for(id);
        true
    }

    /// Cancel every live job matching the type filter (all when `None`).
    /// IDs are snapshotted first so per-job failures or mutation cannot
    /// skip entries. Returns the number of jobs actually cancelled.
    pub fn kill_all_jobs(&self, job_type: Option<JobType>) -> usize {
        let ids = read_lock(&self.shared.registry).ids(job_type);
        let killed = ids.iter().filter(|&&id| self.kill_job(id)).count();
        tracing::info!(
            "killall{}: {} of {} job(s) cancelled",
            job_type.map(|t| format!(" [{}]", t)).unwrap_or_default(),
            killed,
            ids.len()
        );
        killed
    }

    pub fn pause_job(&self, id: u64) -> bool {
        let mut registry = write_lock(&self.shared.registry);
        let Some(record) = registry.get_mut(id) else {
            tracing::warn!("job #{} pause: not found", id);
            return false;
        };
        let ok = record.pause();
        if ok {
            tracing::info!("job #{} pause: ok", id);
        } else {
            tracing::warn!("job #{} pause: invalid from {}", id, record.status());
        }
        ok
    }

    pub fn resume_job(&self, id: u64) -> bool {
        let mut registry = write_lock(&self.shared.registry);
        let Some(record) = registry.get_mut(id) else {
            tracing::warn!("job #{} resume: not found", id);
            return false;
        };
        let ok = record.resume();
        if ok {
            tracing::info!("job #{} resume: ok", id);
        } else {
            tracing::warn!("job #{} resume: invalid from {}", id, record.status());
        }
        ok
    }

    /// Mark an active/paused job completed (one-shot hooks that finished).
    pub fn complete_job(&self, id: u64) -> bool {
        let mut registry = write_lock(&self.shared.registry);
        let Some(record) = registry.get_mut(id) else {
            tracing::warn!("job #{} complete: not found", id);
            return false;
        };
        let ok = record.complete();
        if ok {
            tracing::info!("job #{} complete: ok", id);
            registry.append_history_for(id);
        } else {
            tracing::warn!("job #{} complete: invalid from {}", id, record.status());
        }
        ok
    }

    /// Append an error to a job's metadata. With `fatal`, the job also
    /// transitions to `failed` (releasing its resources).
    pub fn record_error(&self, id: u64, message: impl Into<String>, fatal: bool) -> bool {
        let mut registry = write_lock(&self.shared.registry);
        let Some(record) = registry.get_mut(id) else {
            return false;
        };
        let message = message.into();
        if fatal {
            if record.fail(message.clone()) {
                tracing::warn!("job #{} error (fatal): {}", id, message);
                registry.append_history_for(id);
                return true;
            }
            return false;
        }
        record.append_error(message.clone());
        tracing::warn!("job #{} error: {}", id, message);
        true
    }

    /// Remove every terminal record (`completed`, `cancelled`, `failed`)
    /// from the live mapping. "Stop remembering" is deliberately separate
    /// from "stop acting" (`kill_job`). Returns the count removed.
    pub fn cleanup(&self) -> usize {
        let mut registry = write_lock(&self.shared.registry);
        let terminal: Vec<u64> = registry
            .list(None)
            .iter()
            .filter(|r| r.status().is_terminal())
            .map(|r| r.id)
            .collect();
        for &id in &terminal {
            registry.remove(id);
            tracing::info!("job #{} cleanup: removed", id);
        }
        tracing::info!("cleanup: {} job(s) removed", terminal.len());
        terminal.len()
    }

    pub fn get_job(&self, id: u64) -> Option<JobSnapshot> {
        read_lock(&self.shared.registry).get(id).map(|r| r.snapshot())
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<JobSnapshot> {
        read_lock(&self.shared.registry)
            .list(status)
            .into_iter()
            .map(|r| r.snapshot())
            .collect()
    }

    pub fn statistics(&self) -> JobStatistics {
        read_lock(&self.shared.registry).statistics()
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        read_lock(&self.shared.registry).history(limit)
    }

    pub(crate) fn shared(&self) -> &Arc<ManagerShared> {
        &self.shared
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
