//! Constants and default values for Garrison

use std::path::PathBuf;

/// Default Garrison home directory name
pub const GARRISON_DIR: &str = ".garrison";

/// Default socket file name
pub const SOCKET_FILE: &str = "daemon.sock";

/// Server definitions file
pub const SERVERS_FILE: &str = "servers.json";

/// Schedule rules file
pub const SCHEDULES_FILE: &str = "schedules.json";

/// Panel configuration file
pub const CONFIG_FILE: &str = "config.json";

/// Monitor sampling period in seconds
pub const MONITOR_INTERVAL_SECS: u64 = 3;

/// Wait between the two refreshes of one CPU sample
pub const CPU_SAMPLE_MILLIS: u64 = 100;

/// Rolling history capacity per metric
pub const HISTORY_CAPACITY: usize = 30;

/// Grace period before a stop escalates to a hard kill
pub const STOP_GRACE_SECS: u64 = 10;

/// Settle delay between stop and start during a restart, so the old
/// process releases ports and lock files before the new one binds
pub const RESTART_SETTLE_SECS: u64 = 5;

/// Scheduler driver tick in milliseconds
pub const SCHEDULER_TICK_MILLIS: u64 = 1000;

/// Directory under each server root that holds archives
pub const BACKUPS_DIR: &str = "backups";

/// Archive file name prefix
pub const BACKUP_PREFIX: &str = "backup_";

/// Archive file extension
pub const BACKUP_EXTENSION: &str = "tar.gz";

/// Largest file the editor will open
pub const MAX_EDITABLE_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Event bus capacity; lagged observers lose the oldest events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Get the Garrison home directory
pub fn garrison_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(GARRISON_DIR))
        .unwrap_or_else(|| PathBuf::from(GARRISON_DIR))
}

/// Get the socket path
pub fn socket_path() -> PathBuf {
    garrison_home().join(SOCKET_FILE)
}

/// Get the server definitions path
pub fn servers_path() -> PathBuf {
    garrison_home().join(SERVERS_FILE)
}

/// Get the schedule rules path
pub fn schedules_path() -> PathBuf {
    garrison_home().join(SCHEDULES_FILE)
}

/// Get the panel configuration path
pub fn config_path() -> PathBuf {
    garrison_home().join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garrison_home() {
        let home = garrison_home();
        assert!(home.to_string_lossy().contains(".garrison"));
    }

    #[test]
    fn test_socket_path() {
        let path = socket_path();
        assert!(path.to_string_lossy().contains("daemon.sock"));
    }

    #[test]
    fn test_store_paths() {
        assert!(servers_path().to_string_lossy().ends_with("servers.json"));
        assert!(schedules_path().to_string_lossy().ends_with("schedules.json"));
        assert!(config_path().to_string_lossy().ends_with("config.json"));
    }
}
