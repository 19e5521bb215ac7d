mod auto;
mod export;
mod handle;
mod manager;
mod record;
mod registry;

pub use auto::{detect_hook_type, format_target, ARG_PREVIEW_COUNT, ARG_PREVIEW_MAX};
pub use export::{write_export, JobExport};
pub use handle::JobHandle;
pub use manager::JobManager;
pub use record::{
    Detachable, HookInstaller, JobErrorEntry, JobMetadata, JobRecord, JobSnapshot, JobStatus,
    JobType, Performance, ReleaseAction, Restorable,
};
pub use registry::{HistoryEntry, JobRegistry, JobStatistics};
