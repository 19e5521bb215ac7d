use serde_json::Value;

use super::manager::JobManager;
use super::record::{JobRecord, JobType};

/// Maximum characters of a string argument shown in a synthesized target.
pub const ARG_PREVIEW_MAX: usize = 20;

/// Arguments shown in a synthesized target before eliding the rest.
pub const ARG_PREVIEW_COUNT: usize = 3;

/// Classify a job type from the registering function's name.
///
/// The precedence is inherited behavior and kept byte-for-byte compatible
/// with existing operator tooling: "native" wins over "class"/"trace",
/// which win over "method", then a "hook" prefix, then "batch"/"advanced".
/// Callers that know their type should use `create_job` with an explicit
/// tag instead of routing through this heuristic.
pub fn detect_hook_type(function_name: &str) -> JobType {
    let name = function_name.to_lowercase();
    if name.contains("native") {
        JobType::NativeHook
    } else if name.contains("class") || name.contains("trace") {
        JobType::ClassHook
    } else if name.contains("method") {
        JobType::MethodHook
    } else if name.starts_with("hook") {
        JobType::LocationHook
    } else if name.contains("batch") || name.contains("advanced") {
        JobType::AdvancedHook
    } else {
        JobType::AutoHook
    }
}

/// Synthesize the human-readable target string for an auto-registered hook:
/// `name(arg, arg, arg, ...)` with string args quoted and truncated.
pub fn format_target(function_name: &str, args: &[Value]) -> String {
    let previews: Vec<String> = args
        .iter()
        .take(ARG_PREVIEW_COUNT)
        .map(preview_arg)
        .collect();
    let ellipsis = if args.len() > ARG_PREVIEW_COUNT { ", ..." } else { "" };
    format!("{}({}{})", function_name, previews.join(", "), ellipsis)
}

fn preview_arg(arg: &Value) -> String {
    match arg {
        Value::String(s) => {
            let truncated: String = s.chars().take(ARG_PREVIEW_MAX).collect();
            format!("\"{}\"", truncated)
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

impl JobManager {
    /// Register an already-installed hook as a job. Called by a hook
    /// installer right after it wires its interception; the record is born
    /// `active` with `autoTracked: true`, and the installer's callback
    /// polls the returned ID's handle on every invocation.
    pub fn auto_register_hook(&self, function_name: &str, args: &[Value]) -> u64 {
        let job_type = detect_hook_type(function_name);
        let target = format_target(function_name, args);
        let mut options = serde_json::Map::new();
        options.insert("autoTracked".to_string(), Value::Bool(true));
        self.insert_auto(|id| JobRecord::new_auto(id, job_type, target, options))
    }

    /// Fold one callback hit into an auto-tracked job's metadata. Silent
    /// no-op when the job is gone, not auto-tracked, or no longer active:
    /// a stale callback reporting in is normal, not an error.
    pub fn update_auto_task_hit(&self, id: u64, execution_time_ms: f64) {
        let Some(snapshot) = self.get_job(id) else { return };
        if !snapshot
            .options
            .get("autoTracked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return;
        }
        self.shared().record_hit(id, execution_time_ms);
    }
}
