use std::sync::Weak;

use super::manager::ManagerShared;
use super::record::{JobStatus, StatusCell};

/// The poll surface handed to installed interception callbacks.
///
/// A callback body must call [`JobHandle::should_observe`] on every single
/// invocation, before doing any monitoring work: the underlying interception
/// keeps firing after the manager cancels the job, and only this poll turns
/// it into a silent pass-through. The check is one atomic load. It never
/// touches the registry lock, so it is safe from any thread the engine
/// invokes the callback on.
#[derive(Clone)]
pub struct JobHandle {
    id: u64,
    status: StatusCell,
    manager: Weak<ManagerShared>,
}

impl JobHandle {
    pub(crate) fn new(id: u64, status: StatusCell, manager: Weak<ManagerShared>) -> Self {
        Self { id, status, manager }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status.get()
    }

    /// True when the callback should perform its full monitoring behavior.
    /// False for paused, cancelled, failed, or completed jobs: invoke the
    /// original operation untouched and produce no observable side effects.
    pub fn should_observe(&self) -> bool {
        self.status.get() == JobStatus::Active
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.get() == JobStatus::Cancelled
    }

    /// Report one hit. Ignored unless the job is still active and the
    /// manager is still alive (a handle can outlive the whole session).
    pub fn record_hit(&self, execution_time_ms: f64) {
        if !self.should_observe() {
            return;
        }
        if let Some(shared) = self.manager.upgrade() {
            shared.record_hit(self.id, execution_time_ms);
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("status", &self.status.get())
            .finish()
    }
}
