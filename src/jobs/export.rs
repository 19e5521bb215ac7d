use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;
use super::manager::JobManager;
use super::record::JobSnapshot;
use super::registry::JobStatistics;

/// The structured document produced by `export_jobs`: a timestamp, the
/// statistics snapshot, and every live job summary. Round-trips through
/// JSON so a saved export re-displays the same listing an operator saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExport {
    pub exported_at: DateTime<Utc>,
    pub statistics: JobStatistics,
    pub jobs: Vec<JobSnapshot>,
}

impl JobManager {
    /// Read-only projection of the whole registry for export. Does not
    /// mutate any state.
    pub fn export_jobs(&self) -> JobExport {
        JobExport {
            exported_at: Utc::now(),
            statistics: self.statistics(),
            jobs: self.list_jobs(None),
        }
    }
}

/// Write an export document as pretty JSON under `dir`, named by its
/// timestamp. Returns the path written.
pub fn write_export(export: &JobExport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("jobs-{}.json", export.exported_at.timestamp()));
    std::fs::write(&path, serde_json::to_string_pretty(export)?)?;
    Ok(path)
}
