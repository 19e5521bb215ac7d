use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hooktrack::jobs::{
    Detachable, JobHandle, JobManager, JobStatus, JobType, ReleaseAction, Restorable,
};
use serde_json::json;

struct FakeInterceptor {
    detached: Arc<AtomicUsize>,
}

impl Detachable for FakeInterceptor {
    fn detach(&mut self) -> hooktrack::Result<()> {
        self.detached.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeOriginal {
    restored: Arc<AtomicUsize>,
}

impl Restorable for FakeOriginal {
    fn restore(&mut self) -> hooktrack::Result<()> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn target(&self) -> &str {
        "com.x.Y.z"
    }
}

fn hooked_job(manager: &JobManager, job_type: JobType, detached: &Arc<AtomicUsize>) -> u64 {
    let detached = Arc::clone(detached);
    let id = manager.create_job(
        job_type,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(move |_| Ok(vec![ReleaseAction::Detach(Box::new(FakeInterceptor { detached }))])),
    );
    assert!(manager.execute_job(id));
    id
}

/// The body every installed interception callback runs: poll first, then
/// monitor. Returns whether monitoring side effects were produced.
fn simulated_callback(handle: &JobHandle) -> bool {
    if !handle.should_observe() {
        return false;
    }
    handle.record_hit(5.0);
    true
}

#[test]
fn ids_are_strictly_increasing_even_across_cleanup() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));

    let a = hooked_job(&manager, JobType::MethodHook, &detached);
    let b = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(b > a);

    assert!(manager.kill_job(a));
    assert!(manager.kill_job(b));
    assert_eq!(manager.cleanup(), 2);

    let c = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(c > b); // IDs never reused
}

#[test]
fn failing_installer_leaves_job_failed_with_one_error() {
    let manager = JobManager::new();
    let id = manager.create_job(
        JobType::NativeHook,
        "libfoo.so!open",
        serde_json::Map::new(),
        Box::new(|_| {
            Err(hooktrack::Error::Frida("export not found".to_string()))
        }),
    );

    assert!(!manager.execute_job(id));

    let job = manager.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.metadata.errors.len(), 1);
    assert!(job.metadata.errors[0].message.contains("export not found"));
}

#[test]
fn execute_on_missing_id_fails_cleanly() {
    let manager = JobManager::new();
    assert!(!manager.execute_job(999));
}

#[test]
fn cancelled_job_stays_queryable_until_cleanup() {
    // Regression test for the source defect: deleting the record on kill
    // makes a still-attached callback unable to distinguish "cancelled"
    // from "never existed".
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    let id = hooked_job(&manager, JobType::MethodHook, &detached);
    let handle = manager.handle(id).unwrap();

    assert!(simulated_callback(&handle));
    assert!(manager.kill_job(id));

    // (a) still queryable as cancelled
    let job = manager.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    // (b) resources drained
    assert_eq!(job.resources, 0);
    assert_eq!(detached.load(Ordering::SeqCst), 1);
    // (c) an in-flight callback goes quiet: no hit recorded
    assert!(!simulated_callback(&handle));
    assert_eq!(manager.get_job(id).unwrap().metadata.hit_count, 1);

    // Only cleanup removes the record; the handle still reads cancelled.
    assert_eq!(manager.cleanup(), 1);
    assert!(manager.get_job(id).is_none());
    assert!(handle.is_cancelled());
    assert!(!simulated_callback(&handle));
}

#[test]
fn kill_returns_false_for_missing_and_terminal_jobs() {
    let manager = JobManager::new();
    assert!(!manager.kill_job(1));

    let detached = Arc::new(AtomicUsize::new(0));
    let id = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(manager.kill_job(id));
    assert!(!manager.kill_job(id)); // already cancelled
    assert_eq!(detached.load(Ordering::SeqCst), 1); // drained exactly once
}

#[test]
fn killall_with_type_filter_leaves_others_untouched() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));

    let m1 = hooked_job(&manager, JobType::MethodHook, &detached);
    let m2 = hooked_job(&manager, JobType::MethodHook, &detached);
    let n1 = hooked_job(&manager, JobType::NativeHook, &detached);

    assert_eq!(manager.kill_all_jobs(Some(JobType::MethodHook)), 2);
    assert_eq!(manager.get_job(m1).unwrap().status, JobStatus::Cancelled);
    assert_eq!(manager.get_job(m2).unwrap().status, JobStatus::Cancelled);
    assert_eq!(manager.get_job(n1).unwrap().status, JobStatus::Active);

    assert_eq!(manager.kill_all_jobs(None), 1);
    assert_eq!(manager.get_job(n1).unwrap().status, JobStatus::Cancelled);
}

#[test]
fn cleanup_removes_only_terminal_jobs() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));

    let active = hooked_job(&manager, JobType::MethodHook, &detached);
    let paused = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(manager.pause_job(paused));
    let cancelled = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(manager.kill_job(cancelled));
    let completed = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(manager.complete_job(completed));
    let failed = manager.create_job(
        JobType::MethodHook,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(|_| Err(hooktrack::Error::Frida("boom".to_string()))),
    );
    assert!(!manager.execute_job(failed));

    assert_eq!(manager.cleanup(), 3);
    assert!(manager.get_job(active).is_some());
    assert!(manager.get_job(paused).is_some());
    assert!(manager.get_job(cancelled).is_none());
    assert!(manager.get_job(completed).is_none());
    assert!(manager.get_job(failed).is_none());

    // Nothing terminal left
    assert_eq!(manager.cleanup(), 0);
}

#[test]
fn pause_resume_round_trip_preserves_metadata_and_resources() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    let id = hooked_job(&manager, JobType::MethodHook, &detached);
    let handle = manager.handle(id).unwrap();

    handle.record_hit(10.0);
    let before = manager.get_job(id).unwrap();

    assert!(manager.pause_job(id));
    // Paused: callbacks must go quiet but resources stay attached.
    assert!(!simulated_callback(&handle));
    assert!(manager.resume_job(id));

    let after = manager.get_job(id).unwrap();
    assert_eq!(after.status, JobStatus::Active);
    assert_eq!(after.metadata.hit_count, before.metadata.hit_count);
    assert_eq!(after.resources, before.resources);
    assert_eq!(detached.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_transitions_are_falsy_noops() {
    let manager = JobManager::new();
    let id = manager.create_job(
        JobType::MethodHook,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(|_| Ok(vec![])),
    );

    // pending job: pause/resume/complete all invalid
    assert!(!manager.pause_job(id));
    assert!(!manager.resume_job(id));
    assert!(!manager.complete_job(id));
    assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Pending);

    assert!(!manager.pause_job(999));
    assert!(!manager.resume_job(999));
}

#[test]
fn statistics_totals_are_consistent() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));

    hooked_job(&manager, JobType::MethodHook, &detached);
    let killed = hooked_job(&manager, JobType::NativeHook, &detached);
    assert!(manager.kill_job(killed));
    manager.auto_register_hook("hookBase64", &[json!(1)]);

    let stats = manager.statistics();
    assert_eq!(stats.total_jobs, 3);
    assert_eq!(stats.by_status.values().sum::<usize>(), stats.total_jobs);
    assert_eq!(stats.by_type.values().sum::<usize>(), stats.total_jobs);
    assert_eq!(stats.by_status[&JobStatus::Active], 2);
    assert_eq!(stats.by_status[&JobStatus::Cancelled], 1);
    assert_eq!(stats.by_type[&JobType::LocationHook], 1);
}

#[test]
fn full_method_hook_lifecycle_scenario() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    let detached_for_job = Arc::clone(&detached);

    let id = manager.create_job(
        JobType::MethodHook,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(move |_| {
            Ok(vec![ReleaseAction::Detach(Box::new(FakeInterceptor {
                detached: detached_for_job,
            }))])
        }),
    );
    assert!(manager.execute_job(id));
    assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Active);

    let handle = manager.handle(id).unwrap();
    handle.record_hit(10.0);
    handle.record_hit(20.0);
    handle.record_hit(30.0);

    let job = manager.get_job(id).unwrap();
    assert_eq!(job.metadata.hit_count, 3);
    assert_eq!(job.metadata.performance.avg_time_ms, 20.0);

    assert!(manager.kill_job(id));
    assert_eq!(manager.get_job(id).unwrap().status, JobStatus::Cancelled);
    assert_eq!(detached.load(Ordering::SeqCst), 1);

    assert_eq!(manager.cleanup(), 1);
    assert!(manager.get_job(id).is_none());
}

#[test]
fn auto_registered_hook_classification_scenario() {
    let manager = JobManager::new();
    let id = manager.auto_register_hook("hookBase64", &[json!(1)]);

    let job = manager.get_job(id).unwrap();
    assert_eq!(job.job_type, JobType::LocationHook);
    assert_eq!(job.target, "hookBase64(1)");
    assert_eq!(job.status, JobStatus::Active);
}

#[test]
fn cancel_during_install_releases_late_resources() {
    // Cancel-from-pending is legal; the installer may still be running
    // when it lands. The resources it returns must be drained, not leaked.
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    let detached_for_job = Arc::clone(&detached);
    let manager_for_job = manager.clone();

    let id = manager.create_job(
        JobType::MethodHook,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(move |handle| {
            // The kill arrives while the installer is mid-flight.
            assert!(manager_for_job.kill_job(handle.id()));
            Ok(vec![ReleaseAction::Detach(Box::new(FakeInterceptor {
                detached: detached_for_job,
            }))])
        }),
    );

    assert!(!manager.execute_job(id));
    let job = manager.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.resources, 0);
    assert_eq!(detached.load(Ordering::SeqCst), 1);
}

#[test]
fn fatal_error_during_install_releases_late_resources() {
    // Install posts are fire-and-forget, so the agent can report a fatal
    // error before the installer closure returns. The failed record must
    // still drain the resources the installer hands back.
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    let detached_for_job = Arc::clone(&detached);
    let manager_for_job = manager.clone();

    let id = manager.create_job(
        JobType::NativeHook,
        "libfoo.so!open",
        serde_json::Map::new(),
        Box::new(move |handle| {
            assert!(manager_for_job.record_error(handle.id(), "agent rejected hook", true));
            Ok(vec![ReleaseAction::Detach(Box::new(FakeInterceptor {
                detached: detached_for_job,
            }))])
        }),
    );

    assert!(!manager.execute_job(id));
    let job = manager.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.resources, 0);
    assert_eq!(detached.load(Ordering::SeqCst), 1);
}

#[test]
fn restore_resources_released_on_kill() {
    let manager = JobManager::new();
    let restored = Arc::new(AtomicUsize::new(0));
    let restored_for_job = Arc::clone(&restored);

    let id = manager.create_job(
        JobType::MethodHook,
        "com.x.Y.z",
        serde_json::Map::new(),
        Box::new(move |_| {
            Ok(vec![ReleaseAction::Restore(Box::new(FakeOriginal {
                restored: restored_for_job,
            }))])
        }),
    );
    assert!(manager.execute_job(id));
    assert!(manager.kill_job(id));
    assert_eq!(restored.load(Ordering::SeqCst), 1);
}

#[test]
fn history_records_creation_and_terminal_transitions() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));

    let id = hooked_job(&manager, JobType::MethodHook, &detached);
    assert!(manager.kill_job(id));
    assert_eq!(manager.cleanup(), 1);

    // History survives cleanup of the live record.
    let entries = manager.history(20);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, id);
    assert_eq!(entries[0].status, JobStatus::Pending);
    assert_eq!(entries[1].id, id);
    assert_eq!(entries[1].status, JobStatus::Cancelled);
}

#[test]
fn export_reflects_live_listing() {
    let manager = JobManager::new();
    let detached = Arc::new(AtomicUsize::new(0));
    hooked_job(&manager, JobType::MethodHook, &detached);
    manager.auto_register_hook("traceClass", &[json!("com.example.App")]);

    let export = manager.export_jobs();
    assert_eq!(export.statistics.total_jobs, 2);

    let shown: Vec<u64> = manager.list_jobs(None).iter().map(|j| j.id).collect();
    let exported: Vec<u64> = export.jobs.iter().map(|j| j.id).collect();
    assert_eq!(shown, exported);
}
