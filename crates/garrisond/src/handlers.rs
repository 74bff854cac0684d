//! IPC request handlers
//!
//! Every operation boundary lives here: errors coming up from the managers
//! are converted into notification events plus an error response, and never
//! escape into the daemon loop.

use garrison_core::{validate_server_id, ConfigStore, ScheduleRule};
use garrison_ipc::{Event, ItemKind, Request, Response, ServerSummary};
use std::sync::Arc;
use tracing::{error, info};

use crate::backup::BackupManager;
use crate::events::EventBus;
use crate::files::FileBrowser;
use crate::monitor::Monitor;
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;
use crate::updater::UpdateRunner;

/// Request handler wired to every daemon component
pub struct RequestHandler {
    store: Arc<ConfigStore>,
    supervisor: Arc<Supervisor>,
    monitor: Arc<Monitor>,
    scheduler: Arc<Scheduler>,
    backup: Arc<BackupManager>,
    updater: Arc<UpdateRunner>,
    files: FileBrowser,
    bus: EventBus,
}

impl RequestHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ConfigStore>,
        supervisor: Arc<Supervisor>,
        monitor: Arc<Monitor>,
        scheduler: Arc<Scheduler>,
        backup: Arc<BackupManager>,
        updater: Arc<UpdateRunner>,
        bus: EventBus,
    ) -> Self {
        let files = FileBrowser::new(Arc::clone(&store));
        Self {
            store,
            supervisor,
            monitor,
            scheduler,
            backup,
            updater,
            files,
            bus,
        }
    }

    /// Dispatch one request; `Subscribe` and `Kill` are handled by the
    /// connection loop before reaching this point
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Status => self.status(),
            Request::StartServer { id } => self.start_server(&id),
            Request::StopServer { id } => self.stop_server(&id).await,
            Request::RestartServer { id } => self.restart_server(&id),
            Request::SendCommand { id, command } => self.send_command(&id, &command).await,
            Request::CreateBackup { id } => self.create_backup(&id),
            Request::RestoreBackup { id, filename } => self.restore_backup(&id, &filename),
            Request::DeleteBackup { id, filename } => self.delete_backup(&id, &filename),
            Request::ListBackups { id } => self.list_backups(&id),
            Request::ListFiles { id, path } => self.list_files(&id, &path),
            Request::GetFileContent { id, path } => self.get_file_content(&id, &path),
            Request::SaveFileContent { id, path, content } => {
                self.save_file_content(&id, &path, &content)
            }
            Request::CreateItem {
                id,
                path,
                kind,
                name,
            } => self.create_item(&id, &path, kind, &name),
            Request::AddSchedule { id, rule } => self.add_schedule(&id, rule),
            Request::DeleteSchedule { id, task } => self.delete_schedule(&id, &task),
            Request::ListSchedules { id } => self.list_schedules(&id),
            Request::GetPerformanceHistory { id } => self.performance_history(&id),
            Request::UpdateServer { id } => self.update_server(&id),
            Request::Subscribe | Request::Kill => Response::error("Handled by connection loop"),
        }
    }

    fn status(&self) -> Response {
        let servers = self
            .store
            .load_servers()
            .into_iter()
            .map(|def| {
                let tracked = self.supervisor.is_tracked(&def.id);
                let (cpu, mem) = if tracked {
                    self.monitor.latest(&def.id)
                } else {
                    (0.0, 0.0)
                };
                ServerSummary {
                    id: def.id,
                    name: def.name,
                    status: if tracked { "online" } else { "offline" }.to_string(),
                    cpu,
                    mem,
                }
            })
            .collect();
        Response::Status { servers }
    }

    fn start_server(&self, id: &str) -> Response {
        info!("Handling start request for: {}", id);
        match self.supervisor.start(id) {
            Ok(()) => Response::ok("Start requested"),
            Err(e) => {
                error!("Start failed for {}: {}", id, e);
                self.bus.notify_error(format!("Could not start {}: {}", id, e));
                Response::error(e.to_string())
            }
        }
    }

    async fn stop_server(&self, id: &str) -> Response {
        info!("Handling stop request for: {}", id);
        self.supervisor.stop(id).await;
        Response::ok("Stop requested")
    }

    fn restart_server(&self, id: &str) -> Response {
        info!("Handling restart request for: {}", id);
        // The settle delay makes restart slow; run it detached so this
        // connection and others stay responsive.
        let supervisor = Arc::clone(&self.supervisor);
        let bus = self.bus.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = supervisor.restart(&id).await {
                error!("Restart failed for {}: {}", id, e);
                bus.notify_error(format!("Could not restart {}: {}", id, e));
            }
        });
        Response::ok("Restart requested")
    }

    async fn send_command(&self, id: &str, command: &str) -> Response {
        self.supervisor.send_command(id, command).await;
        Response::ok("Command sent")
    }

    fn create_backup(&self, id: &str) -> Response {
        let backup = Arc::clone(&self.backup);
        let id = id.to_string();
        tokio::spawn(async move {
            backup.create(&id, false).await;
        });
        Response::ok("Backup started")
    }

    fn restore_backup(&self, id: &str, filename: &str) -> Response {
        let backup = Arc::clone(&self.backup);
        let id = id.to_string();
        let filename = filename.to_string();
        tokio::spawn(async move {
            backup.restore(&id, &filename).await;
        });
        Response::ok("Restore started")
    }

    fn delete_backup(&self, id: &str, filename: &str) -> Response {
        match self.backup.delete(id, filename) {
            Ok(()) => {
                self.bus.notify_info("Backup deleted.");
                self.backup.publish_backup_list(id);
                Response::ok("Backup deleted")
            }
            Err(e) => {
                self.bus
                    .notify_error(format!("Could not delete backup: {}", e));
                Response::error(e.to_string())
            }
        }
    }

    fn list_backups(&self, id: &str) -> Response {
        match self.backup.list(id) {
            Ok(backups) => {
                let event = Event::BackupList {
                    id: id.to_string(),
                    backups,
                };
                self.bus.publish(event.clone());
                Response::Event { event }
            }
            Err(e) => {
                self.bus.notify_error(e.to_string());
                Response::error(e.to_string())
            }
        }
    }

    fn list_files(&self, id: &str, path: &str) -> Response {
        match self.files.list_files(id, path) {
            Ok(event) => {
                self.bus.publish(event.clone());
                Response::Event { event }
            }
            Err(e) => {
                self.bus
                    .notify_error(format!("Could not read directory: {}", e));
                Response::error(e.to_string())
            }
        }
    }

    fn get_file_content(&self, id: &str, path: &str) -> Response {
        // Read failures ride inside the event payload, matching how the
        // file viewer consumes them.
        let event = self.files.file_content(id, path);
        self.bus.publish(event.clone());
        Response::Event { event }
    }

    fn save_file_content(&self, id: &str, path: &str, content: &str) -> Response {
        match self.files.save_file_content(id, path, content) {
            Ok(name) => {
                self.bus.notify_success(format!("Saved {}", name));
                Response::ok("File saved")
            }
            Err(e) => {
                self.bus.notify_error(format!("Error saving file: {}", e));
                Response::error(e.to_string())
            }
        }
    }

    fn create_item(&self, id: &str, path: &str, kind: ItemKind, name: &str) -> Response {
        match self.files.create_item(id, path, kind, name) {
            Ok(()) => {
                self.bus
                    .notify_success(format!("Created {}: {}", kind.as_str(), name));
                // Refresh the listing for anyone watching this directory.
                if let Ok(event) = self.files.list_files(id, path) {
                    self.bus.publish(event);
                }
                Response::ok("Item created")
            }
            Err(e) => {
                self.bus
                    .notify_error(format!("Could not create item: {}", e));
                Response::error(e.to_string())
            }
        }
    }

    fn add_schedule(&self, id: &str, rule: ScheduleRule) -> Response {
        if !validate_server_id(id) || self.store.get_server(id).is_none() {
            self.bus.notify_error(format!("Server not found: {}", id));
            return Response::error(format!("Server not found: {}", id));
        }
        if rule.interval == 0 {
            self.bus
                .notify_error("Schedule interval must be at least 1.");
            return Response::error("Schedule interval must be at least 1");
        }

        if let Err(e) = self.store.add_schedule(id, rule) {
            self.bus.notify_error(format!("Could not save schedule: {}", e));
            return Response::error(e.to_string());
        }
        self.scheduler.reload(&self.store.load_schedules());
        self.publish_schedule_list(id);
        self.bus.notify_success("New schedule added!");
        Response::ok("Schedule added")
    }

    fn delete_schedule(&self, id: &str, rule: &ScheduleRule) -> Response {
        match self.store.delete_schedule(id, rule) {
            Ok(_removed) => {
                self.scheduler.reload(&self.store.load_schedules());
                self.publish_schedule_list(id);
                self.bus.notify_info("Schedule removed.");
                Response::ok("Schedule removed")
            }
            Err(e) => {
                self.bus
                    .notify_error(format!("Could not delete schedule: {}", e));
                Response::error(e.to_string())
            }
        }
    }

    fn list_schedules(&self, id: &str) -> Response {
        let schedules = self
            .store
            .load_schedules()
            .remove(id)
            .unwrap_or_default();
        let event = Event::ScheduleList {
            id: id.to_string(),
            schedules,
        };
        self.bus.publish(event.clone());
        Response::Event { event }
    }

    fn publish_schedule_list(&self, id: &str) {
        let schedules = self
            .store
            .load_schedules()
            .remove(id)
            .unwrap_or_default();
        self.bus.publish(Event::ScheduleList {
            id: id.to_string(),
            schedules,
        });
    }

    fn performance_history(&self, id: &str) -> Response {
        match self.monitor.history_snapshot(id) {
            Some((cpu, mem)) => {
                let event = Event::PerformanceHistory {
                    id: id.to_string(),
                    cpu,
                    mem,
                };
                Response::Event { event }
            }
            None => Response::error(format!("Server not found: {}", id)),
        }
    }

    fn update_server(&self, id: &str) -> Response {
        let updater = Arc::clone(&self.updater);
        let id = id.to_string();
        tokio::spawn(async move {
            updater.update(&id).await;
        });
        Response::ok("Update started")
    }
}
