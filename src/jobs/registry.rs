use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::record::{JobRecord, JobStatus, JobType};

/// One line of the audit log: a status snapshot taken at creation and at
/// each terminal transition. Survives `cleanup()` of the live record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub target: String,
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn of(record: &JobRecord) -> Self {
        Self {
            id: record.id,
            job_type: record.job_type,
            target: record.target.clone(),
            status: record.status(),
            at: Utc::now(),
        }
    }
}

/// Aggregate counts over the live mapping. Every enum value is present,
/// zero-filled, so operator tooling never has to special-case absent keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatistics {
    pub total_jobs: usize,
    pub by_status: BTreeMap<JobStatus, usize>,
    pub by_type: BTreeMap<JobType, usize>,
    pub total_hits: u64,
    pub total_errors: usize,
}

/// In-memory store of job records: live mapping, monotonic ID allocator,
/// and the bounded history ring.
pub struct JobRegistry {
    next_id: u64,
    jobs: HashMap<u64, JobRecord>,
    history: VecDeque<HistoryEntry>,
    history_cap: usize,
}

impl JobRegistry {
    pub fn new(history_cap: usize) -> Self {
        Self {
            next_id: 1,
            jobs: HashMap::new(),
            history: VecDeque::new(),
            history_cap,
        }
    }

    /// Next unique ID. Monotonic, never reused, even after removal.
    pub fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, record: JobRecord) {
        self.jobs.insert(record.id, record);
    }

    pub fn get(&self, id: u64) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut JobRecord> {
        self.jobs.get_mut(&id)
    }

    /// Detach the record from the live mapping. Does NOT drain its
    /// resources; the caller cancels first.
    pub fn remove(&mut self, id: u64) -> Option<JobRecord> {
        self.jobs.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// All live records, optionally filtered by exact status, ordered by ID.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<&JobRecord> {
        let mut records: Vec<&JobRecord> = self
            .jobs
            .values()
            .filter(|r| status.map_or(true, |s| r.status() == s))
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Snapshot of live IDs, optionally filtered by type, ordered by ID.
    /// Batch operations snapshot first so mutation cannot skip entries.
    pub fn ids(&self, job_type: Option<JobType>) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .jobs
            .values()
            .filter(|r| job_type.map_or(true, |t| r.job_type == t))
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot a live record into the history log by ID. No-op when the
    /// record is gone.
    pub fn append_history_for(&mut self, id: u64) {
        if let Some(record) = self.jobs.get(&id) {
            let entry = HistoryEntry::of(record);
            self.append_history(entry);
        }
    }

    pub fn append_history(&mut self, entry: HistoryEntry) {
        self.history.push_back(entry);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// The `limit` most recent entries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn statistics(&self) -> JobStatistics {
        let mut by_status: BTreeMap<JobStatus, usize> =
            JobStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_type: BTreeMap<JobType, usize> =
            JobType::ALL.iter().map(|t| (*t, 0)).collect();
        let mut total_hits = 0u64;
        let mut total_errors = 0usize;

        for record in self.jobs.values() {
            *by_status.entry(record.status()).or_insert(0) += 1;
            *by_type.entry(record.job_type).or_insert(0) += 1;
            total_hits += record.metadata.hit_count;
            total_errors += record.metadata.errors.len();
        }

        JobStatistics {
            total_jobs: self.jobs.len(),
            by_status,
            by_type,
            total_hits,
            total_errors,
        }
    }
}
