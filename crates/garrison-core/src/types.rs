//! Core types for Garrison

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::constants::HISTORY_CAPACITY;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern for valid server ids: only alphanumeric, underscore, and hyphen
static SERVER_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid server id regex"));

/// Validate a server id so it can never smuggle path separators
pub fn validate_server_id(id: &str) -> bool {
    !id.is_empty() && SERVER_ID_REGEX.is_match(id)
}

/// Definition of a managed game server
///
/// Owned by the configuration store; the daemon reads it per operation and
/// never caches it beyond one call, so config edits take effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Unique, stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Shell command line used to launch the server
    pub start_command: String,
    /// Absolute path; also the sandbox root for all file access
    pub working_directory: PathBuf,
    /// External package identifier consumed by the update tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl ServerDefinition {
    /// Create a new definition, validating the server id
    pub fn new(
        id: String,
        name: String,
        start_command: String,
        working_directory: PathBuf,
    ) -> Result<Self> {
        if !validate_server_id(&id) {
            return Err(Error::ConfigError(format!(
                "Invalid server id '{}': only alphanumeric characters, underscores, and hyphens are allowed",
                id
            )));
        }

        Ok(Self {
            id,
            name,
            start_command,
            working_directory,
            app_id: None,
        })
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }
}

/// Maintenance action run by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAction {
    Restart,
    Update,
    Backup,
}

impl ScheduleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleAction::Restart => "restart",
            ScheduleAction::Update => "update",
            ScheduleAction::Backup => "backup",
        }
    }
}

impl std::fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interval unit for schedule rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleUnit {
    Hours,
    Days,
}

impl std::fmt::Display for ScheduleUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleUnit::Hours => write!(f, "hours"),
            ScheduleUnit::Days => write!(f, "days"),
        }
    }
}

/// A recurring maintenance rule for one server
///
/// `at_time` ("HH:MM") is only meaningful when the unit is days. Rules are
/// compared by value: deleting a schedule removes every rule equal to the
/// submitted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub action: ScheduleAction,
    pub interval: u32,
    pub unit: ScheduleUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
}

/// A backup archive on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub filename: String,
    pub size_mb: f64,
    pub created_at: String,
}

/// Observed liveness of a server, as reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Online,
    Offline,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
        }
    }
}

/// Panel-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Path to the external install/update tool binary
    #[serde(default)]
    pub install_tool_path: String,
}

/// Fixed-capacity rolling buffers of CPU and memory samples
///
/// Created zero-filled, so the length is always `HISTORY_CAPACITY`; pushing
/// evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    cpu: VecDeque<f64>,
    mem: VecDeque<f64>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self {
            cpu: std::iter::repeat(0.0).take(HISTORY_CAPACITY).collect(),
            mem: std::iter::repeat(0.0).take(HISTORY_CAPACITY).collect(),
        }
    }

    /// Append one sample pair, evicting the oldest
    pub fn push(&mut self, cpu: f64, mem: f64) {
        if self.cpu.len() == HISTORY_CAPACITY {
            self.cpu.pop_front();
        }
        if self.mem.len() == HISTORY_CAPACITY {
            self.mem.pop_front();
        }
        self.cpu.push_back(cpu);
        self.mem.push_back(mem);
    }

    /// Snapshot of the CPU samples, oldest first
    pub fn cpu(&self) -> Vec<f64> {
        self.cpu.iter().copied().collect()
    }

    /// Snapshot of the memory samples, oldest first
    pub fn mem(&self) -> Vec<f64> {
        self.mem.iter().copied().collect()
    }

    /// Most recent sample pair
    pub fn latest(&self) -> (f64, f64) {
        (
            self.cpu.back().copied().unwrap_or(0.0),
            self.mem.back().copied().unwrap_or(0.0),
        )
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new()
    }
}
