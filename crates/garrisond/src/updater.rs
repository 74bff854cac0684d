//! Update runner - drives the external install tool for a server package
//!
//! The tool itself (download, login, content delivery) is an external
//! collaborator; this module only spawns it for a server's package id and
//! relays its output. At most one tool process runs at a time.

use garrison_core::ConfigStore;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use crate::events::EventBus;

pub struct UpdateRunner {
    store: Arc<ConfigStore>,
    bus: EventBus,
    running: Arc<AtomicBool>,
}

impl UpdateRunner {
    pub fn new(store: Arc<ConfigStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a tool process is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the update tool for one server's package
    ///
    /// All feedback flows through `installer_output` events tagged with
    /// `updater_<id>`; failures never propagate past this method.
    pub async fn update(&self, id: &str) {
        let context_id = format!("updater_{}", id);

        let config = self.store.load_config();
        if config.install_tool_path.is_empty() || !Path::new(&config.install_tool_path).exists() {
            self.bus.installer(
                &context_id,
                "--- ERROR: install tool path is not configured. Check settings. ---",
            );
            return;
        }

        let Some(def) = self.store.get_server(id) else {
            self.bus.installer(
                &context_id,
                format!("--- ERROR: server '{}' not found. ---", id),
            );
            return;
        };
        let Some(app_id) = def.app_id.clone() else {
            self.bus.installer(
                &context_id,
                format!("--- ERROR: server '{}' has no package id. ---", id),
            );
            return;
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.bus.installer(
                &context_id,
                "--- Another update is already running. Please wait. ---",
            );
            return;
        }

        self.bus
            .installer(&context_id, format!("--- Starting update for {} ---", def.name));
        info!("Running update tool for {} (package {})", def.id, app_id);

        let mut command = Command::new(&config.install_tool_path);
        command
            .arg("+force_install_dir")
            .arg(&def.working_directory)
            .arg("+login")
            .arg("anonymous")
            .arg("+app_update")
            .arg(&app_id)
            .arg("validate")
            .arg("+quit")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.bus.installer(
                    &context_id,
                    format!("--- FATAL ERROR during update: {} ---", e),
                );
                self.running.store(false, Ordering::SeqCst);
                return;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_installer_reader(stdout, context_id.clone(), self.bus.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_installer_reader(stderr, context_id.clone(), self.bus.clone());
        }

        let bus = self.bus.clone();
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            if let Err(e) = child.wait().await {
                warn!("Update tool wait failed: {}", e);
            }
            bus.installer(&context_id, "--- Process Finished! ---");
            running.store(false, Ordering::SeqCst);
        });
    }
}

fn spawn_installer_reader<R>(stream: R, context_id: String, bus: EventBus)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            bus.installer(&context_id, line);
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use garrison_core::{PanelConfig, ServerDefinition, EVENT_CHANNEL_CAPACITY};
    use garrison_ipc::Event;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(tool: Option<&str>) -> (TempDir, Arc<ConfigStore>, EventBus, UpdateRunner) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().to_path_buf()));
        store.ensure_defaults().unwrap();

        if let Some(script) = tool {
            let tool_path = dir.path().join("tool.sh");
            std::fs::write(&tool_path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool_path, std::fs::Permissions::from_mode(0o755)).unwrap();
            store
                .save_config(&PanelConfig {
                    install_tool_path: tool_path.to_string_lossy().into_owned(),
                })
                .unwrap();
        }

        let work_dir = dir.path().join("srv");
        std::fs::create_dir_all(&work_dir).unwrap();
        let def = ServerDefinition::new(
            "s1".to_string(),
            "One".to_string(),
            "sleep 30".to_string(),
            work_dir,
        )
        .unwrap()
        .with_app_id("380870");
        store.save_servers(&[def]).unwrap();

        let bus = EventBus::new(EVENT_CHANNEL_CAPACITY);
        let runner = UpdateRunner::new(Arc::clone(&store), bus.clone());
        (dir, store, bus, runner)
    }

    async fn collect_installer_lines(
        rx: &mut tokio::sync::broadcast::Receiver<Event>,
        until: &str,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            while let Ok(event) = rx.recv().await {
                if let Event::InstallerOutput { data, .. } = event {
                    let done = data.contains(until);
                    lines.push(data);
                    if done {
                        break;
                    }
                }
            }
        })
        .await;
        lines
    }

    #[tokio::test]
    async fn test_missing_tool_path_reports_error() {
        let (_dir, _store, bus, runner) = setup(None);
        let mut rx = bus.subscribe();

        runner.update("s1").await;

        match rx.try_recv().unwrap() {
            Event::InstallerOutput { data, context_id } => {
                assert!(data.contains("install tool path"));
                assert_eq!(context_id, "updater_s1");
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_update_streams_tool_output() {
        let (_dir, _store, bus, runner) = setup(Some("echo updating; echo done"));
        let mut rx = bus.subscribe();

        runner.update("s1").await;
        let lines = collect_installer_lines(&mut rx, "Process Finished").await;

        assert!(lines.iter().any(|l| l == "updating"));
        assert!(lines.iter().any(|l| l.contains("Process Finished")));
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_server_without_app_id_reports_error() {
        let (dir, store, bus, runner) = setup(Some("echo hi"));
        let def = ServerDefinition::new(
            "s1".to_string(),
            "One".to_string(),
            "sleep 30".to_string(),
            dir.path().join("srv"),
        )
        .unwrap();
        store.save_servers(&[def]).unwrap();

        let mut rx = bus.subscribe();
        runner.update("s1").await;

        match rx.try_recv().unwrap() {
            Event::InstallerOutput { data, .. } => assert!(data.contains("no package id")),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_update_is_refused() {
        let (_dir, _store, bus, runner) = setup(Some("sleep 2"));
        let mut rx = bus.subscribe();

        runner.update("s1").await;
        assert!(runner.is_running());

        runner.update("s1").await;
        let lines = collect_installer_lines(&mut rx, "already running").await;
        assert!(lines.iter().any(|l| l.contains("already running")));
    }
}
