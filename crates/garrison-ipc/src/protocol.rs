//! IPC Protocol - Request/Response/Event types

use garrison_core::{BackupEntry, ScheduleRule};
use serde::{Deserialize, Serialize};

/// IPC Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Check if daemon is alive
    Ping,

    /// Get a status summary for every defined server
    Status,

    /// Spawn a server process
    StartServer { id: String },

    /// Gracefully stop a server process
    StopServer { id: String },

    /// Stop, settle, and start a server process
    RestartServer { id: String },

    /// Write one line to a running server's console
    SendCommand { id: String, command: String },

    /// Archive a server's working directory
    CreateBackup { id: String },

    /// Unpack an archive over a server's working directory
    RestoreBackup { id: String, filename: String },

    /// Delete one archive
    DeleteBackup { id: String, filename: String },

    /// List the archives of a server
    ListBackups { id: String },

    /// List one directory inside the sandbox
    ListFiles { id: String, path: String },

    /// Read a file inside the sandbox
    GetFileContent { id: String, path: String },

    /// Write a file inside the sandbox
    SaveFileContent {
        id: String,
        path: String,
        content: String,
    },

    /// Create a file or folder inside the sandbox
    ///
    /// The item kind rides under `kind`; the `type` key is taken by the
    /// request tag.
    CreateItem {
        id: String,
        path: String,
        kind: ItemKind,
        name: String,
    },

    /// Add a recurring maintenance rule
    AddSchedule {
        id: String,
        #[serde(flatten)]
        rule: ScheduleRule,
    },

    /// Remove every rule equal to the submitted one
    DeleteSchedule { id: String, task: ScheduleRule },

    /// List the rules of a server
    ListSchedules { id: String },

    /// Get the rolling CPU/memory history of a server
    GetPerformanceHistory { id: String },

    /// Run the external update tool for a server's package
    UpdateServer { id: String },

    /// Turn this connection into an event stream
    Subscribe,

    /// Stop daemon and all processes
    Kill,
}

/// Kind of filesystem item to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
        }
    }
}

/// One row of the status summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub cpu: f64,
    pub mem: f64,
}

/// IPC Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Ping response
    Pong,

    /// Success with message
    Ok { message: String },

    /// Error with message
    Error { message: String },

    /// Status summary for every server
    Status { servers: Vec<ServerSummary> },

    /// An event, either answering a query or streamed to a subscriber
    Event { event: Event },
}

impl Response {
    pub fn ok<S: Into<String>>(message: S) -> Self {
        Response::Ok {
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Severity of a notification event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    Success,
    Info,
    Error,
}

impl NotifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyStatus::Success => "success",
            NotifyStatus::Info => "info",
            NotifyStatus::Error => "error",
        }
    }
}

/// Asynchronous events broadcast to observers
///
/// Delivery is fire-and-forget: a slow or disconnected observer loses the
/// oldest events, never blocks the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One line of a server's stdout or stderr
    ConsoleOutput { id: String, data: String },

    /// Lightweight liveness badge with formatted samples
    StatusUpdate {
        id: String,
        status: String,
        cpu: String,
        mem: String,
    },

    /// Numeric sample pair for chart appends
    PerformanceUpdate { id: String, cpu: f64, mem: f64 },

    /// Full rolling history, oldest first
    PerformanceHistory {
        id: String,
        cpu: Vec<f64>,
        mem: Vec<f64>,
    },

    /// One line of install/update tool output
    InstallerOutput { data: String, context_id: String },

    /// Directory listing inside a sandbox
    FileList {
        id: String,
        path: String,
        dirs: Vec<String>,
        files: Vec<String>,
    },

    /// File contents, or the error that prevented reading them
    FileContent {
        path: String,
        content: Option<String>,
        error: Option<String>,
    },

    /// Archives of one server, newest first
    BackupList {
        id: String,
        backups: Vec<BackupEntry>,
    },

    /// Schedule rules of one server
    ScheduleList {
        id: String,
        schedules: Vec<ScheduleRule>,
    },

    /// User-facing outcome message
    Notification {
        status: NotifyStatus,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_core::{ScheduleAction, ScheduleUnit};

    #[test]
    fn test_request_serialize() {
        let req = Request::StartServer {
            id: "valheim".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("start_server"));
        assert!(json.contains("valheim"));
    }

    #[test]
    fn test_request_round_trip() {
        let req = Request::SendCommand {
            id: "ark".to_string(),
            command: "saveworld".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();
        match parsed {
            Request::SendCommand { id, command } => {
                assert_eq!(id, "ark");
                assert_eq!(command, "saveworld");
            }
            _ => panic!("Wrong request type"),
        }
    }

    #[test]
    fn test_schedule_request_round_trip() {
        let req = Request::AddSchedule {
            id: "valheim".to_string(),
            rule: ScheduleRule {
                action: ScheduleAction::Restart,
                interval: 6,
                unit: ScheduleUnit::Hours,
                at_time: None,
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("add_schedule"));
        // The rule is flattened into the payload.
        assert!(json.contains("\"interval\":6"));
        let parsed: Request = serde_json::from_str(&json).unwrap();
        match parsed {
            Request::AddSchedule { rule, .. } => assert_eq!(rule.interval, 6),
            _ => panic!("Wrong request type"),
        }
    }

    #[test]
    fn test_create_item_round_trip() {
        let req = Request::CreateItem {
            id: "valheim".to_string(),
            path: "".to_string(),
            kind: ItemKind::Folder,
            name: "mods".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"create_item\""));
        assert!(json.contains("\"kind\":\"folder\""));
        let parsed: Request = serde_json::from_str(&json).unwrap();
        match parsed {
            Request::CreateItem { kind, name, .. } => {
                assert_eq!(kind, ItemKind::Folder);
                assert_eq!(name, "mods");
            }
            _ => panic!("Wrong request type"),
        }
    }

    #[test]
    fn test_response_serialize() {
        let resp = Response::ok("Server started");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("ok"));
        assert!(json.contains("Server started"));
    }

    #[test]
    fn test_response_error_helpers() {
        let resp = Response::error("boom");
        assert!(resp.is_error());
        assert_eq!(resp.error_message(), Some("boom"));
        assert!(!Response::Pong.is_error());
    }

    #[test]
    fn test_event_tagging() {
        let event = Event::StatusUpdate {
            id: "valheim".to_string(),
            status: "online".to_string(),
            cpu: "12.50".to_string(),
            mem: "512.00".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"status_update\""));
        assert!(json.contains("12.50"));
    }

    #[test]
    fn test_event_in_response_round_trip() {
        let resp = Response::Event {
            event: Event::Notification {
                status: NotifyStatus::Error,
                message: "Backup failed".to_string(),
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        match parsed {
            Response::Event {
                event: Event::Notification { status, message },
            } => {
                assert_eq!(status, NotifyStatus::Error);
                assert_eq!(message, "Backup failed");
            }
            _ => panic!("Wrong response type"),
        }
    }

    #[test]
    fn test_item_kind_snake_case() {
        let json = serde_json::to_string(&ItemKind::Folder).unwrap();
        assert_eq!(json, "\"folder\"");
    }
}
