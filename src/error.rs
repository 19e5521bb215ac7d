use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("INSTALL_FAILED: Hook installation for job {id} failed: {reason}")]
    InstallFailed { id: u64, reason: String },

    #[error("DETACH_FAILED: {0}")]
    DetachFailed(String),

    #[error("RESTORE_FAILED: {0}")]
    RestoreFailed(String),

    #[error("BRIDGE_NOT_ATTACHED: No Frida bridge attached. Call attach first.")]
    BridgeNotAttached,

    #[error("FRIDA_ATTACH_FAILED: Failed to attach Frida: {0}")]
    FridaAttachFailed(String),

    #[error("PROCESS_NOT_RUNNING: Target process {0} is not running.")]
    ProcessNotRunning(u32),

    #[error("Frida error: {0}")]
    Frida(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
