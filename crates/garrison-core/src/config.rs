//! JSON-file backed stores for server, schedule and panel configuration
//!
//! Loads are tolerant (a missing or corrupt file reads as empty) so one bad
//! edit never takes the daemon down; saves are explicit and fail loudly.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_FILE, SCHEDULES_FILE, SERVERS_FILE};
use crate::error::Result;
use crate::types::{PanelConfig, ScheduleRule, ServerDefinition};

/// Store rooted at a directory holding the three JSON files
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Open the store in the Garrison home directory, creating it if needed
    pub fn open_default() -> Result<Self> {
        let dir = crate::constants::garrison_home();
        fs::create_dir_all(&dir)?;
        Ok(Self::new(dir))
    }

    /// Create any missing store files with empty defaults
    pub fn ensure_defaults(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        if !self.servers_file().exists() {
            self.write_json(&self.servers_file(), &Vec::<ServerDefinition>::new())?;
        }
        if !self.schedules_file().exists() {
            self.write_json(
                &self.schedules_file(),
                &HashMap::<String, Vec<ScheduleRule>>::new(),
            )?;
        }
        if !self.config_file().exists() {
            self.write_json(&self.config_file(), &PanelConfig::default())?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn servers_file(&self) -> PathBuf {
        self.dir.join(SERVERS_FILE)
    }

    fn schedules_file(&self) -> PathBuf {
        self.dir.join(SCHEDULES_FILE)
    }

    fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn load_servers(&self) -> Vec<ServerDefinition> {
        self.read_json(&self.servers_file())
    }

    pub fn save_servers(&self, servers: &[ServerDefinition]) -> Result<()> {
        self.write_json(&self.servers_file(), &servers)
    }

    /// Look up one definition by id; reads the file fresh every call
    pub fn get_server(&self, id: &str) -> Option<ServerDefinition> {
        self.load_servers().into_iter().find(|s| s.id == id)
    }

    pub fn load_schedules(&self) -> HashMap<String, Vec<ScheduleRule>> {
        self.read_json(&self.schedules_file())
    }

    pub fn save_schedules(&self, schedules: &HashMap<String, Vec<ScheduleRule>>) -> Result<()> {
        self.write_json(&self.schedules_file(), schedules)
    }

    /// Append a rule for a server and persist the full rule set
    pub fn add_schedule(&self, server_id: &str, rule: ScheduleRule) -> Result<()> {
        let mut schedules = self.load_schedules();
        schedules.entry(server_id.to_string()).or_default().push(rule);
        self.save_schedules(&schedules)
    }

    /// Remove every rule equal to `rule`; returns how many were dropped
    pub fn delete_schedule(&self, server_id: &str, rule: &ScheduleRule) -> Result<usize> {
        let mut schedules = self.load_schedules();
        let mut removed = 0;
        if let Some(rules) = schedules.get_mut(server_id) {
            let before = rules.len();
            rules.retain(|r| r != rule);
            removed = before - rules.len();
            if rules.is_empty() {
                schedules.remove(server_id);
            }
        }
        self.save_schedules(&schedules)?;
        Ok(removed)
    }

    pub fn load_config(&self) -> PanelConfig {
        self.read_json(&self.config_file())
    }

    pub fn save_config(&self, config: &PanelConfig) -> Result<()> {
        self.write_json(&self.config_file(), config)
    }

    fn read_json<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        match fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => {
                serde_json::from_str(&content).unwrap_or_default()
            }
            _ => T::default(),
        }
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduleAction, ScheduleUnit};
    use tempfile::TempDir;

    fn store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        store.ensure_defaults().unwrap();
        (dir, store)
    }

    fn rule() -> ScheduleRule {
        ScheduleRule {
            action: ScheduleAction::Backup,
            interval: 1,
            unit: ScheduleUnit::Days,
            at_time: Some("04:00".to_string()),
        }
    }

    #[test]
    fn test_ensure_defaults_creates_files() {
        let (dir, _store) = store();
        assert!(dir.path().join(SERVERS_FILE).exists());
        assert!(dir.path().join(SCHEDULES_FILE).exists());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_servers_round_trip() {
        let (_dir, store) = store();
        assert!(store.load_servers().is_empty());

        let def = ServerDefinition::new(
            "valheim".to_string(),
            "Valheim".to_string(),
            "./valheim_server.x86_64".to_string(),
            PathBuf::from("/srv/valheim"),
        )
        .unwrap();
        store.save_servers(&[def]).unwrap();

        let loaded = store.load_servers();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "valheim");
        assert!(store.get_server("valheim").is_some());
        assert!(store.get_server("missing").is_none());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (dir, store) = store();
        fs::write(dir.path().join(SERVERS_FILE), "not json {{{").unwrap();
        assert!(store.load_servers().is_empty());
    }

    #[test]
    fn test_schedule_add_and_delete() {
        let (_dir, store) = store();
        store.add_schedule("valheim", rule()).unwrap();
        store.add_schedule("valheim", rule()).unwrap();

        let schedules = store.load_schedules();
        assert_eq!(schedules.get("valheim").map(Vec::len), Some(2));

        // Delete-by-value removes every matching rule.
        let removed = store.delete_schedule("valheim", &rule()).unwrap();
        assert_eq!(removed, 2);
        assert!(store.load_schedules().get("valheim").is_none());
    }

    #[test]
    fn test_panel_config_round_trip() {
        let (_dir, store) = store();
        assert!(store.load_config().install_tool_path.is_empty());

        let config = PanelConfig {
            install_tool_path: "/opt/steamcmd/steamcmd.sh".to_string(),
        };
        store.save_config(&config).unwrap();
        assert_eq!(
            store.load_config().install_tool_path,
            "/opt/steamcmd/steamcmd.sh"
        );
    }
}
