use std::path::PathBuf;

use crate::config::HooktrackSettings;
use crate::jobs::{
    write_export, HistoryEntry, JobManager, JobSnapshot, JobStatistics, JobStatus, JobType,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Operator-facing command surface. Thin wrappers over the manager that
/// log what an operator needs to see in a live session; every command
/// fails cleanly (false / 0 / empty, with a notice) when no manager has
/// been constructed yet.
pub struct Console {
    manager: Option<JobManager>,
    settings: HooktrackSettings,
}

impl Console {
    pub fn new(manager: JobManager, settings: HooktrackSettings) -> Self {
        Self {
            manager: Some(manager),
            settings,
        }
    }

    /// A console with no manager behind it. Commands warn and fail cleanly.
    pub fn detached() -> Self {
        Self {
            manager: None,
            settings: HooktrackSettings::default(),
        }
    }

    fn manager(&self) -> Option<&JobManager> {
        if self.manager.is_none() {
            tracing::warn!("job manager not initialized, attach to a process first");
        }
        self.manager.as_ref()
    }

    /// List live jobs, optionally filtered by status.
    pub fn jobs(&self, status: Option<JobStatus>) -> Vec<JobSnapshot> {
        let Some(manager) = self.manager() else { return vec![] };
        let jobs = manager.list_jobs(status);
        if jobs.is_empty() {
            match status {
                Some(s) => tracing::info!("no jobs with status {}", s),
                None => tracing::info!("no jobs registered"),
            }
            return jobs;
        }
        for job in &jobs {
            tracing::info!(
                "job #{:<4} {:<13} {:<9} hits={:<6} {}",
                job.id,
                job.job_type,
                job.status,
                job.metadata.hit_count,
                job.target
            );
        }
        jobs
    }

    /// Show one job in detail.
    pub fn job(&self, id: u64) -> Option<JobSnapshot> {
        let manager = self.manager()?;
        let Some(job) = manager.get_job(id) else {
            tracing::warn!("job #{} show: not found", id);
            return None;
        };
        tracing::info!("job #{}: {}", job.id, job.description);
        tracing::info!("  status:    {}", job.status);
        tracing::info!("  created:   {}", job.created_at);
        tracing::info!("  modified:  {}", job.last_modified);
        tracing::info!(
            "  hits:      {} (avg {:.2} ms)",
            job.metadata.hit_count,
            job.metadata.performance.avg_time_ms
        );
        tracing::info!("  resources: {}", job.resources);
        for err in &job.metadata.errors {
            tracing::info!("  error:     [{}] {}", err.at, err.message);
        }
        Some(job)
    }

    pub fn kill(&self, id: u64) -> bool {
        self.manager().map_or(false, |m| m.kill_job(id))
    }

    pub fn killall(&self, job_type: Option<JobType>) -> usize {
        self.manager().map_or(0, |m| m.kill_all_jobs(job_type))
    }

    pub fn pause(&self, id: u64) -> bool {
        self.manager().map_or(false, |m| m.pause_job(id))
    }

    pub fn resume(&self, id: u64) -> bool {
        self.manager().map_or(false, |m| m.resume_job(id))
    }

    pub fn jobstats(&self) -> Option<JobStatistics> {
        let manager = self.manager()?;
        let stats = manager.statistics();
        tracing::info!(
            "jobs: {} live, {} hit(s), {} error(s)",
            stats.total_jobs,
            stats.total_hits,
            stats.total_errors
        );
        for (status, count) in stats.by_status.iter().filter(|(_, &c)| c > 0) {
            tracing::info!("  {:<10} {}", status, count);
        }
        for (job_type, count) in stats.by_type.iter().filter(|(_, &c)| c > 0) {
            tracing::info!("  {:<13} {}", job_type, count);
        }
        Some(stats)
    }

    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let Some(manager) = self.manager() else { return vec![] };
        let entries = manager.history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        if entries.is_empty() {
            tracing::info!("no job history");
            return entries;
        }
        for entry in &entries {
            tracing::info!(
                "[{}] job #{} {} {} ({})",
                entry.at,
                entry.id,
                entry.status,
                entry.target,
                entry.job_type
            );
        }
        entries
    }

    pub fn cleanup(&self) -> usize {
        self.manager().map_or(0, |m| m.cleanup())
    }

    /// Export the registry to a timestamped JSON file under the configured
    /// export directory.
    pub fn export_jobs(&self) -> Option<PathBuf> {
        let manager = self.manager()?;
        let export = manager.export_jobs();
        match write_export(&export, &self.settings.export_dir) {
            Ok(path) => {
                tracing::info!(
                    "exported {} job(s) to {}",
                    export.jobs.len(),
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                tracing::warn!("export failed: {}", e);
                None
            }
        }
    }
}
