mod worker;

use std::sync::mpsc::Sender;
use std::thread;

use tokio::sync::oneshot;

use crate::jobs::{Detachable, JobManager, JobType, ReleaseAction, Restorable};
use crate::{Error, Result};
use worker::{bridge_worker, BridgeCommand};

/// Check if a process is alive. Returns true if the process exists,
/// even if we lack permission to signal it (EPERM).
fn is_process_alive(pid: u32) -> bool {
    let result = unsafe { libc::kill(pid as i32, 0) };
    if result == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    matches!(err.raw_os_error(), Some(libc::EPERM))
}

/// An attach-style hook installed in the agent. Detaching posts an unhook
/// message; the agent detaches its Interceptor listener.
pub struct ScriptHook {
    cmd_tx: Sender<BridgeCommand>,
    job_id: u64,
}

impl Detachable for ScriptHook {
    fn detach(&mut self) -> Result<()> {
        let message = serde_json::json!({ "type": "unhook", "jobId": self.job_id }).to_string();
        self.cmd_tx
            .send(BridgeCommand::Post {
                message,
                response: None,
            })
            .map_err(|_| Error::DetachFailed("Bridge worker thread died".to_string()))
    }

    fn describe(&self) -> String {
        format!("agent interceptor (job #{})", self.job_id)
    }
}

/// A replacement-style hook: the agent swapped a Java method's
/// implementation and keeps the original. Restoring posts an unhook
/// message; the agent puts the original implementation back.
pub struct ScriptReplacement {
    cmd_tx: Sender<BridgeCommand>,
    job_id: u64,
    target: String,
}

impl Restorable for ScriptReplacement {
    fn restore(&mut self) -> Result<()> {
        let message = serde_json::json!({ "type": "unhook", "jobId": self.job_id }).to_string();
        self.cmd_tx
            .send(BridgeCommand::Post {
                message,
                response: None,
            })
            .map_err(|_| Error::RestoreFailed("Bridge worker thread died".to_string()))
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Async façade over the Frida worker thread. One bridge per attached
/// target process.
pub struct FridaBridge {
    cmd_tx: Sender<BridgeCommand>,
}

impl FridaBridge {
    /// Start the worker thread. Agent messages (hits, errors) are routed
    /// into `manager`.
    pub fn new(manager: JobManager) -> Self {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();

        thread::spawn(move || {
            bridge_worker(cmd_rx, manager);
        });

        Self { cmd_tx }
    }

    /// Attach to a running process and load the embedded agent.
    pub async fn attach(&self, pid: u32) -> Result<()> {
        if !is_process_alive(pid) {
            return Err(Error::ProcessNotRunning(pid));
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::Attach {
                pid,
                response: response_tx,
            })
            .map_err(|_| Error::Frida("Bridge worker thread died".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::Frida("Bridge worker response lost".to_string()))?
    }

    /// Hook a Java method by implementation replacement, tracked as a job.
    /// The record owns a [`ScriptReplacement`]: cancelling the job restores
    /// the original implementation in the agent.
    pub async fn hook_java_method(
        &self,
        manager: &JobManager,
        class: &str,
        method: &str,
    ) -> Result<u64> {
        let target = format!("{}.{}", class, method);
        let cmd_tx = self.cmd_tx.clone();
        let class = class.to_string();
        let method = method.to_string();

        let id = manager.create_job(
            JobType::MethodHook,
            target.clone(),
            serde_json::Map::new(),
            Box::new(move |handle| {
                let message = serde_json::json!({
                    "type": "install_java_hook",
                    "jobId": handle.id(),
                    "class": class,
                    "method": method,
                })
                .to_string();
                cmd_tx
                    .send(BridgeCommand::Post {
                        message,
                        response: None,
                    })
                    .map_err(|_| Error::Frida("Bridge worker thread died".to_string()))?;
                Ok(vec![ReleaseAction::Restore(Box::new(ScriptReplacement {
                    cmd_tx: cmd_tx.clone(),
                    job_id: handle.id(),
                    target,
                }))])
            }),
        );

        if manager.execute_job(id) {
            Ok(id)
        } else {
            Err(Error::InstallFailed {
                id,
                reason: "installer did not complete".to_string(),
            })
        }
    }

    /// Hook a native export with an attach-style interceptor, tracked as a
    /// job. Cancelling the job detaches the agent's listener.
    pub async fn hook_native_export(
        &self,
        manager: &JobManager,
        module: &str,
        export: &str,
    ) -> Result<u64> {
        let target = format!("{}!{}", module, export);
        let cmd_tx = self.cmd_tx.clone();
        let module = module.to_string();
        let export = export.to_string();

        let id = manager.create_job(
            JobType::NativeHook,
            target,
            serde_json::Map::new(),
            Box::new(move |handle| {
                let message = serde_json::json!({
                    "type": "install_native_hook",
                    "jobId": handle.id(),
                    "module": module,
                    "export": export,
                })
                .to_string();
                cmd_tx
                    .send(BridgeCommand::Post {
                        message,
                        response: None,
                    })
                    .map_err(|_| Error::Frida("Bridge worker thread died".to_string()))?;
                Ok(vec![ReleaseAction::Detach(Box::new(ScriptHook {
                    cmd_tx: cmd_tx.clone(),
                    job_id: handle.id(),
                }))])
            }),
        );

        if manager.execute_job(id) {
            Ok(id)
        } else {
            Err(Error::InstallFailed {
                id,
                reason: "installer did not complete".to_string(),
            })
        }
    }

    /// Unload the agent and stop the session.
    pub async fn stop(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::Stop {
                response: response_tx,
            })
            .map_err(|_| Error::Frida("Bridge worker thread died".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::Frida("Bridge worker response lost".to_string()))?
    }
}
