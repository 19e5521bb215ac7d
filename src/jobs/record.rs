use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::Result;
use super::handle::JobHandle;

/// Classification of the hooked target. Display and filtering only; the
/// manager treats every type identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    MethodHook,
    ClassHook,
    NativeHook,
    LocationHook,
    AdvancedHook,
    BatchHook,
    AutoHook,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::MethodHook,
        JobType::ClassHook,
        JobType::NativeHook,
        JobType::LocationHook,
        JobType::AdvancedHook,
        JobType::BatchHook,
        JobType::AutoHook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::MethodHook => "method_hook",
            JobType::ClassHook => "class_hook",
            JobType::NativeHook => "native_hook",
            JobType::LocationHook => "location_hook",
            JobType::AdvancedHook => "advanced_hook",
            JobType::BatchHook => "batch_hook",
            JobType::AutoHook => "auto_hook",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        JobType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Job lifecycle state. Stored as a `u8` so installed callbacks can read it
/// through an atomic cell without taking the registry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum JobStatus {
    Pending = 0,
    Active = 1,
    Paused = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Active,
        JobStatus::Paused,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    fn from_u8(v: u8) -> JobStatus {
        match v {
            0 => JobStatus::Pending,
            1 => JobStatus::Active,
            2 => JobStatus::Paused,
            3 => JobStatus::Completed,
            4 => JobStatus::Failed,
            _ => JobStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Shared status cell. The record and every handle given to installed
/// callbacks hold clones; a poll is a single atomic load, so a callback
/// firing right after `kill_job` observes the cancellation without locking.
#[derive(Clone)]
pub struct StatusCell(Arc<AtomicU8>);

impl StatusCell {
    pub(crate) fn new(status: JobStatus) -> Self {
        StatusCell(Arc::new(AtomicU8::new(status as u8)))
    }

    pub fn get(&self) -> JobStatus {
        JobStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, status: JobStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }
}

/// An attach-style interception that can be torn down.
pub trait Detachable: Send + Sync {
    fn detach(&mut self) -> Result<()>;

    fn describe(&self) -> String {
        "interceptor".to_string()
    }
}

/// A saved original implementation that can be put back in place of a
/// replacement hook.
pub trait Restorable: Send + Sync {
    fn restore(&mut self) -> Result<()>;

    fn target(&self) -> &str;
}

/// One resource owned by a job record, released exactly once when the job
/// reaches a terminal state.
pub enum ReleaseAction {
    Detach(Box<dyn Detachable>),
    Restore(Box<dyn Restorable>),
    Invoke(Box<dyn FnOnce() -> Result<()> + Send + Sync>),
}

impl ReleaseAction {
    pub fn kind(&self) -> &'static str {
        match self {
            ReleaseAction::Detach(_) => "detach",
            ReleaseAction::Restore(_) => "restore",
            ReleaseAction::Invoke(_) => "invoke",
        }
    }

    pub(crate) fn release(self) -> Result<()> {
        match self {
            ReleaseAction::Detach(mut handle) => handle.detach(),
            ReleaseAction::Restore(mut original) => original.restore(),
            ReleaseAction::Invoke(callback) => callback(),
        }
    }
}

impl std::fmt::Debug for ReleaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Performance {
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMetadata {
    pub hit_count: u64,
    pub last_hit: Option<DateTime<Utc>>,
    pub errors: Vec<JobErrorEntry>,
    pub performance: Performance,
}

/// The closure that performs the actual instrumentation when a job is
/// executed. Receives the handle its callbacks must poll, returns the
/// resources the record will own.
pub type HookInstaller = Box<dyn FnOnce(JobHandle) -> Result<Vec<ReleaseAction>> + Send + Sync>;

/// Read-only projection of a record for queries, listings, and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: u64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub target: String,
    pub options: serde_json::Map<String, serde_json::Value>,
    pub status: JobStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub metadata: JobMetadata,
    pub resources: usize,
}

/// One registered instrumentation task.
pub struct JobRecord {
    pub id: u64,
    pub job_type: JobType,
    pub target: String,
    pub options: serde_json::Map<String, serde_json::Value>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub metadata: JobMetadata,
    status: StatusCell,
    resources: Vec<ReleaseAction>,
    installer: Option<HookInstaller>,
}

impl JobRecord {
    /// A pending record awaiting `execute_job`.
    pub fn new(
        id: u64,
        job_type: JobType,
        target: impl Into<String>,
        options: serde_json::Map<String, serde_json::Value>,
        installer: HookInstaller,
    ) -> Self {
        Self::build(id, job_type, target.into(), options, Some(installer), JobStatus::Pending)
    }

    /// An auto-registered record: its hook was installed by the caller before
    /// registration, so it is born active with nothing left to execute.
    pub fn new_auto(
        id: u64,
        job_type: JobType,
        target: impl Into<String>,
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self::build(id, job_type, target.into(), options, None, JobStatus::Active)
    }

    fn build(
        id: u64,
        job_type: JobType,
        target: String,
        options: serde_json::Map<String, serde_json::Value>,
        installer: Option<HookInstaller>,
        status: JobStatus,
    ) -> Self {
        let now = Utc::now();
        let description = format!("{} on {}", job_type, target);
        Self {
            id,
            job_type,
            target,
            options,
            description,
            created_at: now,
            last_modified: now,
            metadata: JobMetadata::default(),
            status: StatusCell::new(status),
            resources: Vec::new(),
            installer,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status.get()
    }

    pub(crate) fn status_cell(&self) -> StatusCell {
        self.status.clone()
    }

    pub fn is_auto_tracked(&self) -> bool {
        self.options
            .get("autoTracked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn take_installer(&mut self) -> Option<HookInstaller> {
        self.installer.take()
    }

    pub(crate) fn adopt_resources(&mut self, resources: Vec<ReleaseAction>) {
        self.resources.extend(resources);
    }

    fn set_status(&mut self, status: JobStatus) {
        self.status.set(status);
        self.last_modified = Utc::now();
    }

    pub fn append_error(&mut self, message: impl Into<String>) {
        self.metadata.errors.push(JobErrorEntry {
            at: Utc::now(),
            message: message.into(),
        });
        self.last_modified = Utc::now();
    }

    /// pending → active, once the installer has run successfully.
    pub(crate) fn mark_active(&mut self) -> bool {
        match self.status() {
            JobStatus::Pending => {
                self.set_status(JobStatus::Active);
                true
            }
            _ => false,
        }
    }

    /// active → paused. Invalid from any other state.
    pub fn pause(&mut self) -> bool {
        match self.status() {
            JobStatus::Active => {
                self.set_status(JobStatus::Paused);
                true
            }
            _ => false,
        }
    }

    /// paused → active.
    pub fn resume(&mut self) -> bool {
        match self.status() {
            JobStatus::Paused => {
                self.set_status(JobStatus::Active);
                true
            }
            _ => false,
        }
    }

    /// active/paused → completed, for hooks that finish on their own.
    /// Owned resources are released: a completed hook has nothing left to do.
    pub fn complete(&mut self) -> bool {
        match self.status() {
            JobStatus::Active | JobStatus::Paused => {
                self.drain_resources();
                self.set_status(JobStatus::Completed);
                true
            }
            _ => false,
        }
    }

    /// Any non-terminal state → failed, recording the error.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.append_error(message);
        self.drain_resources();
        self.set_status(JobStatus::Failed);
        true
    }

    /// pending/active/paused → cancelled. Drains every owned resource:
    /// interceptors detached, originals restored, cancel callbacks invoked.
    /// A single failing teardown is recorded and the drain continues.
    pub fn cancel(&mut self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.drain_resources();
        self.set_status(JobStatus::Cancelled);
        true
    }

    /// Release resources that arrived after the record already reached a
    /// terminal state (an installer finishing after a cancel-from-pending).
    pub(crate) fn release_residual(&mut self) {
        self.drain_resources();
    }

    fn drain_resources(&mut self) {
        let resources = std::mem::take(&mut self.resources);
        for action in resources {
            let kind = action.kind();
            if let Err(e) = action.release() {
                tracing::warn!("job #{} release ({}): failed: {}", self.id, kind, e);
                self.metadata.errors.push(JobErrorEntry {
                    at: Utc::now(),
                    message: format!("release ({}) failed: {}", kind, e),
                });
            }
        }
    }

    /// Record one callback invocation. Only counts while the job is active.
    pub fn record_hit(&mut self, execution_time_ms: f64) -> bool {
        if self.status() != JobStatus::Active {
            return false;
        }
        self.metadata.hit_count += 1;
        self.metadata.last_hit = Some(Utc::now());
        self.metadata.performance.total_time_ms += execution_time_ms;
        self.metadata.performance.avg_time_ms =
            self.metadata.performance.total_time_ms / self.metadata.hit_count as f64;
        self.last_modified = Utc::now();
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            job_type: self.job_type,
            target: self.target.clone(),
            options: self.options.clone(),
            status: self.status(),
            description: self.description.clone(),
            created_at: self.created_at,
            last_modified: self.last_modified,
            metadata: self.metadata.clone(),
            resources: self.resources.len(),
        }
    }
}
