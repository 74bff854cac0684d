//! Process supervisor - spawns, tracks and stops game server processes

use garrison_core::{constants, ConfigStore, Error, Result, ServerDefinition};
use garrison_ipc::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::EventBus;

/// A tracked child process with its attached pipes
///
/// Exactly one of these exists per server id; it lives from a successful
/// spawn until the process is stopped or the monitor observes it dead.
pub struct TrackedProcess {
    pub child: Child,
    pub pid: Option<u32>,
    /// Shared stdin handle so console commands can be written concurrently
    stdin: Option<Arc<Mutex<ChildStdin>>>,
    /// Background line readers for stdout and stderr
    #[allow(dead_code)]
    reader_handles: Vec<JoinHandle<()>>,
}

/// Table of live processes keyed by server id
pub type ProcessTable = Arc<RwLock<HashMap<String, TrackedProcess>>>;

/// Process supervisor
pub struct Supervisor {
    store: Arc<ConfigStore>,
    table: ProcessTable,
    bus: EventBus,
}

impl Supervisor {
    pub fn new(store: Arc<ConfigStore>, bus: EventBus) -> Self {
        Self {
            store,
            table: Arc::new(RwLock::new(HashMap::new())),
            bus,
        }
    }

    /// Shared handle to the process table (used by the monitor loop)
    pub fn table(&self) -> ProcessTable {
        Arc::clone(&self.table)
    }

    /// Whether a server currently has a tracked process
    pub fn is_tracked(&self, id: &str) -> bool {
        self.table.read().contains_key(id)
    }

    /// Start a server process
    ///
    /// A no-op when the definition is missing or the server is already
    /// tracked and alive. The liveness check, spawn and insert happen under
    /// one write lock (spawning is synchronous), so two racing starts can
    /// never leave two processes in the table.
    pub fn start(&self, id: &str) -> Result<()> {
        let Some(def) = self.store.get_server(id) else {
            debug!("Start ignored: no definition for '{}'", id);
            return Ok(());
        };

        let mut table = self.table.write();
        let stale = match table.get_mut(id) {
            Some(tracked) => match tracked.child.try_wait() {
                Ok(None) => {
                    debug!("Start ignored: '{}' is already running", id);
                    return Ok(());
                }
                // Exited since the last monitor tick; replace it.
                _ => true,
            },
            None => false,
        };
        if stale {
            table.remove(id);
        }

        self.bus
            .console(id, format!("--- Starting server: {} ---", def.name));

        match self.spawn_process(&def) {
            Ok(tracked) => {
                table.insert(id.to_string(), tracked);
                Ok(())
            }
            Err(e) => {
                self.bus
                    .console(id, format!("--- FATAL ERROR: {} ---", e));
                self.bus
                    .console(id, "Check the working directory and start command!");
                Err(e)
            }
        }
    }

    fn spawn_process(&self, def: &ServerDefinition) -> Result<TrackedProcess> {
        let mut command = shell_command(&def.start_command);
        command
            .current_dir(&def.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Children never outlive the daemon; there is no orphan
            // adoption on restart.
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| Error::SpawnFailed(e.to_string()))?;
        let pid = child.id();
        info!("Started server {} with PID {:?}", def.id, pid);

        let mut reader_handles = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            reader_handles.push(spawn_line_reader(stdout, def.id.clone(), self.bus.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            reader_handles.push(spawn_line_reader(stderr, def.id.clone(), self.bus.clone()));
        }
        let stdin = child.stdin.take().map(|s| Arc::new(Mutex::new(s)));

        Ok(TrackedProcess {
            child,
            pid,
            stdin,
            reader_handles,
        })
    }

    /// Stop a server process
    ///
    /// A no-op when untracked. Sends a graceful termination signal, waits up
    /// to the grace period, then force-kills. The table entry is removed on
    /// every path.
    pub async fn stop(&self, id: &str) {
        let tracked = self.table.write().remove(id);
        let Some(mut tracked) = tracked else {
            debug!("Stop ignored: '{}' is not tracked", id);
            return;
        };

        self.bus.console(id, "--- Sending stop signal... ---");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = tracked.pid {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tracked.child.start_kill();
        }

        let grace = Duration::from_secs(constants::STOP_GRACE_SECS);
        match tokio::time::timeout(grace, tracked.child.wait()).await {
            Ok(Ok(status)) => debug!("Server {} exited with code {:?}", id, status.code()),
            Ok(Err(e)) => warn!("Error waiting for {}: {}", id, e),
            Err(_) => {
                self.bus.console(id, "--- Forcing termination... ---");
                let _ = tracked.child.kill().await;
            }
        }

        info!("Stopped server {}", id);
    }

    /// Restart a server: stop, settle, start
    ///
    /// The settle delay gives the old process time to release OS-level
    /// resources (ports, lock files); respawning immediately makes some
    /// server binaries fail to bind.
    pub async fn restart(&self, id: &str) -> Result<()> {
        if self.store.get_server(id).is_none() {
            return Ok(());
        }
        self.bus.console(id, "--- Restarting server... ---");
        self.stop(id).await;
        tokio::time::sleep(Duration::from_secs(constants::RESTART_SETTLE_SECS)).await;
        self.start(id)
    }

    /// Write one line to a running server's console
    ///
    /// Failures surface as console error events, never as crashes.
    pub async fn send_command(&self, id: &str, command: &str) {
        let stdin = self.table.read().get(id).and_then(|t| t.stdin.clone());
        let Some(stdin) = stdin else {
            self.bus
                .console(id, "--- Error: server is not running ---");
            return;
        };

        let mut guard = stdin.lock().await;
        let payload = format!("{}\n", command);
        if let Err(e) = guard.write_all(payload.as_bytes()).await {
            self.bus.console(id, format!("--- Error: {} ---", e));
            return;
        }
        if let Err(e) = guard.flush().await {
            self.bus.console(id, format!("--- Error: {} ---", e));
        }
    }
}

/// Build a shell invocation for a configured command line
fn shell_command(line: &str) -> Command {
    #[cfg(unix)]
    {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    }
    #[cfg(not(unix))]
    {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(line);
        command
    }
}

/// Forward each line of a child stream as a console event
///
/// The reader exits at end-of-stream; declaring the process dead is the
/// monitor loop's call, not the reader's.
fn spawn_line_reader<R>(stream: R, id: String, bus: EventBus) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            bus.publish(Event::ConsoleOutput {
                id: id.clone(),
                data: line,
            });
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use garrison_core::EVENT_CHANNEL_CAPACITY;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(start_command: &str) -> (TempDir, Arc<ConfigStore>, EventBus, Supervisor) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().to_path_buf()));
        store.ensure_defaults().unwrap();

        let work_dir = dir.path().join("srv");
        std::fs::create_dir_all(&work_dir).unwrap();
        let def = ServerDefinition::new(
            "s1".to_string(),
            "Test Server".to_string(),
            start_command.to_string(),
            work_dir,
        )
        .unwrap();
        store.save_servers(&[def]).unwrap();

        let bus = EventBus::new(EVENT_CHANNEL_CAPACITY);
        let supervisor = Supervisor::new(Arc::clone(&store), bus.clone());
        (dir, store, bus, supervisor)
    }

    #[tokio::test]
    async fn test_double_start_tracks_one_process() {
        let (_dir, _store, _bus, supervisor) = setup("sleep 30");

        supervisor.start("s1").unwrap();
        let first_pid = supervisor.table.read().get("s1").unwrap().pid;

        supervisor.start("s1").unwrap();
        let table = supervisor.table.read();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("s1").unwrap().pid, first_pid);
        drop(table);

        supervisor.stop("s1").await;
    }

    #[tokio::test]
    async fn test_start_unknown_server_is_a_noop() {
        let (_dir, _store, _bus, supervisor) = setup("sleep 30");
        supervisor.start("missing").unwrap();
        assert!(!supervisor.is_tracked("missing"));
    }

    #[tokio::test]
    async fn test_spawn_failure_emits_fatal_event() {
        let (_dir, store, bus, supervisor) = setup("sleep 30");

        // Break the working directory so the spawn itself fails.
        let def = ServerDefinition::new(
            "s1".to_string(),
            "Broken".to_string(),
            "sleep 30".to_string(),
            Path::new("/nonexistent/garrison-test").to_path_buf(),
        )
        .unwrap();
        store.save_servers(&[def]).unwrap();

        let mut rx = bus.subscribe();
        assert!(supervisor.start("s1").is_err());
        assert!(!supervisor.is_tracked("s1"));

        let mut saw_fatal = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::ConsoleOutput { data, .. } = event {
                if data.contains("FATAL ERROR") {
                    saw_fatal = true;
                }
            }
        }
        assert!(saw_fatal);
    }

    #[tokio::test]
    async fn test_stop_untracked_is_silent() {
        let (_dir, _store, bus, supervisor) = setup("sleep 30");
        let mut rx = bus.subscribe();

        supervisor.stop("s1").await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_removes_entry() {
        let (_dir, _store, _bus, supervisor) = setup("sleep 30");
        supervisor.start("s1").unwrap();
        assert!(supervisor.is_tracked("s1"));

        supervisor.stop("s1").await;
        assert!(!supervisor.is_tracked("s1"));
    }

    #[tokio::test]
    async fn test_console_lines_are_forwarded() {
        let (_dir, _store, bus, supervisor) = setup("echo ready; sleep 30");
        let mut rx = bus.subscribe();

        supervisor.start("s1").unwrap();

        let deadline = tokio::time::Duration::from_secs(5);
        let mut saw_ready = false;
        let _ = tokio::time::timeout(deadline, async {
            while let Ok(event) = rx.recv().await {
                if let Event::ConsoleOutput { data, .. } = event {
                    if data == "ready" {
                        saw_ready = true;
                        break;
                    }
                }
            }
        })
        .await;
        assert!(saw_ready);

        supervisor.stop("s1").await;
    }

    #[tokio::test]
    async fn test_send_command_reaches_stdin() {
        // `cat` echoes stdin back to stdout, so the command round-trips
        // through the reader task.
        let (_dir, _store, bus, supervisor) = setup("cat");
        let mut rx = bus.subscribe();

        supervisor.start("s1").unwrap();
        supervisor.send_command("s1", "saveworld").await;

        let deadline = tokio::time::Duration::from_secs(5);
        let mut echoed = false;
        let _ = tokio::time::timeout(deadline, async {
            while let Ok(event) = rx.recv().await {
                if let Event::ConsoleOutput { data, .. } = event {
                    if data == "saveworld" {
                        echoed = true;
                        break;
                    }
                }
            }
        })
        .await;
        assert!(echoed);

        supervisor.stop("s1").await;
    }

    #[tokio::test]
    async fn test_send_command_untracked_emits_error() {
        let (_dir, _store, bus, supervisor) = setup("sleep 30");
        let mut rx = bus.subscribe();

        supervisor.send_command("s1", "hello").await;

        match rx.try_recv().unwrap() {
            Event::ConsoleOutput { data, .. } => assert!(data.contains("not running")),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restart_waits_the_settle_delay() {
        let (_dir, _store, _bus, supervisor) = setup("sleep 30");
        supervisor.start("s1").unwrap();
        let first_pid = supervisor.table.read().get("s1").unwrap().pid;

        let started = std::time::Instant::now();
        supervisor.restart("s1").await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(constants::RESTART_SETTLE_SECS));
        assert!(supervisor.is_tracked("s1"));
        assert_ne!(supervisor.table.read().get("s1").unwrap().pid, first_pid);

        supervisor.stop("s1").await;
    }
}
