use frida::{DeviceManager, DeviceType, Frida, Message, ScriptHandler, ScriptOption};
use tokio::sync::oneshot;

use crate::jobs::JobManager;
use crate::Result;

// Embedded agent code
const AGENT_CODE: &str = include_str!("agent.js");

/// Commands sent to the Frida worker thread.
pub(crate) enum BridgeCommand {
    Attach {
        pid: u32,
        response: oneshot::Sender<Result<()>>,
    },
    /// Post a raw JSON message to the agent. `response` is `None` for
    /// fire-and-forget posts (hook installs from installer closures,
    /// unhooks from teardown resources).
    Post {
        message: String,
        response: Option<oneshot::Sender<Result<()>>>,
    },
    Stop {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Message handler that routes agent payloads into the job manager.
struct BridgeMessageHandler {
    manager: JobManager,
}

impl ScriptHandler for BridgeMessageHandler {
    fn on_message(&mut self, message: Message, _data: Option<Vec<u8>>) {
        match &message {
            Message::Send(msg) => {
                // Our agent sends custom payloads - extract from returns field
                if let Some(payload) = msg.payload.returns.as_object() {
                    if let Some(msg_type) = payload.get("type").and_then(|v| v.as_str()) {
                        handle_agent_payload(&self.manager, msg_type, &msg.payload.returns);
                    }
                }
            }
            Message::Other(value) => {
                // Messages arrive with payload in a nested "data" field as a JSON string
                // Format: {"data": "{\"type\":\"send\",\"payload\":{...}}", "error": "..."}
                if let Some(data_str) = value.get("data").and_then(|v| v.as_str()) {
                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(data_str) {
                        if let Some(payload) = parsed.get("payload") {
                            if let Some(msg_type) = payload.get("type").and_then(|v| v.as_str()) {
                                handle_agent_payload(&self.manager, msg_type, payload);
                            }
                        }
                    }
                } else if let Some(payload) = value.get("payload") {
                    // Fallback: check for direct payload (in case format changes)
                    if let Some(msg_type) = payload.get("type").and_then(|v| v.as_str()) {
                        handle_agent_payload(&self.manager, msg_type, payload);
                    }
                }
            }
            Message::Log(log) => {
                tracing::info!("Agent log: {}", log.payload);
            }
            Message::Error(err) => {
                tracing::error!(
                    "Agent error: {} at {}:{}:{}",
                    err.description,
                    err.file_name,
                    err.line_number,
                    err.column_number
                );
            }
        }
    }
}

fn handle_agent_payload(manager: &JobManager, msg_type: &str, payload: &serde_json::Value) {
    tracing::debug!("Agent message: type={}", msg_type);
    let job_id = payload.get("jobId").and_then(|v| v.as_u64());
    match msg_type {
        "hook_hit" => {
            if let Some(id) = job_id {
                let execution_time_ms = payload
                    .get("executionTimeMs")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                manager.update_auto_task_hit(id, execution_time_ms);
            }
        }
        "hook_installed" => {
            if let Some(id) = job_id {
                tracing::debug!("job #{} agent: hook installed", id);
            }
        }
        "hook_error" => {
            if let Some(id) = job_id {
                let message = payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown agent error");
                let fatal = payload
                    .get("fatal")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                manager.record_error(id, message, fatal);
            }
        }
        "log" => {
            if let Some(msg) = payload.get("message").and_then(|v| v.as_str()) {
                tracing::info!("Agent: {}", msg);
            }
        }
        "agent_loaded" => {
            if let Some(msg) = payload.get("message").and_then(|v| v.as_str()) {
                tracing::info!("Agent loaded: {}", msg);
            }
        }
        _ => {
            tracing::debug!("Unknown message type from agent: {}", msg_type);
        }
    }
}

/// Frida worker that runs on a dedicated thread. The Frida handle, device,
/// session, and script are not Send, so they live and die here; the async
/// façade talks to us over the command channel.
pub(crate) fn bridge_worker(cmd_rx: std::sync::mpsc::Receiver<BridgeCommand>, manager: JobManager) {
    // Initialize Frida on this thread (unsafe because it initializes global state)
    let frida = unsafe { Frida::obtain() };
    let device_manager = DeviceManager::obtain(&frida);

    // Script for the single attached target.
    // Session and Script are kept as leaked boxes with 'static lifetime to
    // avoid lifetime complexity. This leaks memory but is acceptable for a
    // long-running session tool attached to one process.
    let mut script: Option<&'static mut frida::Script<'static>> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            BridgeCommand::Attach { pid, response } => {
                let result = (|| -> Result<()> {
                    // Prefer a USB device (Android target over adb), fall
                    // back to the local device (frida-server on the host).
                    let devices = device_manager.enumerate_all_devices();
                    let mut device = devices
                        .into_iter()
                        .find(|d| d.get_type() == DeviceType::USB)
                        .or_else(|| {
                            device_manager
                                .enumerate_all_devices()
                                .into_iter()
                                .find(|d| d.get_type() == DeviceType::Local)
                        })
                        .ok_or_else(|| {
                            crate::Error::FridaAttachFailed("No Frida device found".to_string())
                        })?;

                    let frida_session = device.attach(pid).map_err(|e| {
                        tracing::error!("Attach to PID {} failed: {:?}", pid, e);
                        crate::Error::FridaAttachFailed(format!(
                            "Attach to PID {} failed: {}",
                            pid, e
                        ))
                    })?;

                    // Leak session to get 'static lifetime
                    let leaked_session: &'static mut frida::Session<'static> =
                        Box::leak(Box::new(unsafe { std::mem::transmute(frida_session) }));

                    let mut new_script = leaked_session
                        .create_script(AGENT_CODE, &mut ScriptOption::new())
                        .map_err(|e| {
                            crate::Error::FridaAttachFailed(format!(
                                "Script creation failed: {}",
                                e
                            ))
                        })?;

                    let handler = BridgeMessageHandler {
                        manager: manager.clone(),
                    };
                    new_script.handle_message(handler).map_err(|e| {
                        crate::Error::FridaAttachFailed(format!(
                            "Message handler setup failed: {}",
                            e
                        ))
                    })?;

                    new_script.load().map_err(|e| {
                        crate::Error::FridaAttachFailed(format!("Script load failed: {}", e))
                    })?;

                    // Leak script to get 'static lifetime
                    let leaked_script: &'static mut frida::Script<'static> =
                        Box::leak(Box::new(unsafe { std::mem::transmute(new_script) }));

                    let init_msg = serde_json::json!({ "type": "initialize" });
                    leaked_script
                        .post(&init_msg.to_string(), None)
                        .map_err(|e| {
                            crate::Error::FridaAttachFailed(format!("Init message failed: {}", e))
                        })?;

                    tracing::info!("Attached to PID {} and loaded agent", pid);
                    script = Some(leaked_script);
                    Ok(())
                })();

                let _ = response.send(result);
            }

            BridgeCommand::Post { message, response } => {
                let result = match script.as_mut() {
                    Some(script) => script
                        .post(&message, None)
                        .map_err(|e| crate::Error::Frida(format!("Post failed: {}", e))),
                    None => Err(crate::Error::BridgeNotAttached),
                };
                if let Err(ref e) = result {
                    tracing::warn!("Agent post failed: {}", e);
                }
                if let Some(response) = response {
                    let _ = response.send(result);
                }
            }

            BridgeCommand::Stop { response } => {
                if let Some(script) = script.take() {
                    let shutdown = serde_json::json!({ "type": "shutdown" });
                    if let Err(e) = script.post(&shutdown.to_string(), None) {
                        tracing::warn!("Shutdown message failed: {}", e);
                    }
                }
                let _ = response.send(Ok(()));
            }
        }
    }
}
