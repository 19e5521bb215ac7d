use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MAX_HISTORY_ENTRIES: usize = 10_000;
pub const MIN_HISTORY_ENTRIES: usize = 10;

/// All configurable settings with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct HooktrackSettings {
    pub history_max_entries: usize,
    pub export_dir: PathBuf,
}

impl Default for HooktrackSettings {
    fn default() -> Self {
        Self {
            history_max_entries: 100,
            export_dir: PathBuf::from("/tmp/hooktrack/exports"),
        }
    }
}

/// Raw JSON representation, all fields optional for partial overrides.
#[derive(Debug, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "history.maxEntries")]
    history_max_entries: Option<usize>,
    #[serde(rename = "export.dir")]
    export_dir: Option<PathBuf>,
}

/// Resolve settings: defaults → user global → project-local.
pub fn resolve(project_root: Option<&Path>) -> HooktrackSettings {
    let global_path = dirs::home_dir().map(|h| h.join(".hooktrack/settings.json"));
    let project_path = project_root.map(|r| r.join(".hooktrack/settings.json"));
    resolve_with_paths(global_path.as_deref(), project_path.as_deref())
}

/// Testable resolver that accepts explicit file paths (no home dir dependency).
fn resolve_with_paths(
    global_path: Option<&Path>,
    project_path: Option<&Path>,
) -> HooktrackSettings {
    let mut settings = HooktrackSettings::default();

    if let Some(path) = global_path {
        apply_file(&mut settings, path);
    }
    if let Some(path) = project_path {
        apply_file(&mut settings, path);
    }

    settings
}

fn apply_file(settings: &mut HooktrackSettings, path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    let Ok(file) = serde_json::from_str::<SettingsFile>(&content) else {
        tracing::warn!("Invalid settings file, ignoring: {}", path.display());
        return;
    };
    if let Some(v) = file.history_max_entries {
        if (MIN_HISTORY_ENTRIES..=MAX_HISTORY_ENTRIES).contains(&v) {
            settings.history_max_entries = v;
        } else {
            tracing::warn!(
                "history.maxEntries ({}) out of range ({}..{}), using default",
                v,
                MIN_HISTORY_ENTRIES,
                MAX_HISTORY_ENTRIES
            );
        }
    }
    if let Some(v) = file.export_dir {
        if v.is_absolute() {
            settings.export_dir = v;
        } else {
            tracing::warn!("export.dir ({}) is not absolute, using default", v.display());
        }
    }
}
