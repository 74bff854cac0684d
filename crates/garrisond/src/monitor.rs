//! Monitor loop - samples CPU/memory and detects dead processes

use garrison_core::{constants, ConfigStore, MetricHistory, ServerStatus};
use garrison_ipc::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::EventBus;
use crate::supervisor::ProcessTable;

/// How a tracked entry looked at the start of a tick
enum Liveness {
    Untracked,
    Dead,
    Alive(Option<u32>),
}

/// Periodic sampler over every defined server
///
/// Histories are created lazily per server id and live for the daemon's
/// lifetime, so a server keeps its chart across process restarts.
pub struct Monitor {
    store: Arc<ConfigStore>,
    table: ProcessTable,
    history: RwLock<HashMap<String, MetricHistory>>,
    system: RwLock<System>,
    bus: EventBus,
}

impl Monitor {
    pub fn new(store: Arc<ConfigStore>, table: ProcessTable, bus: EventBus) -> Self {
        Self {
            store,
            table,
            history: RwLock::new(HashMap::new()),
            system: RwLock::new(System::new()),
            bus,
        }
    }

    /// Run the loop forever on the fixed monitor period
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(constants::MONITOR_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    /// One monitor pass over the current definition set
    ///
    /// Per-server failures are absorbed into zero samples and offline
    /// status; nothing here may kill the loop.
    pub async fn tick(&self) {
        let definitions = self.store.load_servers();

        {
            let mut history = self.history.write();
            for def in &definitions {
                history
                    .entry(def.id.clone())
                    .or_insert_with(MetricHistory::new);
            }
        }

        for def in &definitions {
            let id = def.id.as_str();

            // Liveness is decided under the table lock; the sample wait
            // happens outside it.
            let liveness = {
                let mut table = self.table.write();
                let liveness = match table.get_mut(id) {
                    None => Liveness::Untracked,
                    Some(tracked) => match tracked.child.try_wait() {
                        Ok(None) => Liveness::Alive(tracked.pid),
                        _ => Liveness::Dead,
                    },
                };
                if matches!(liveness, Liveness::Dead) {
                    table.remove(id);
                }
                liveness
            };

            let (status, cpu, mem) = match liveness {
                Liveness::Alive(Some(pid)) => {
                    let (cpu, mem) = self.sample(pid).await;
                    (ServerStatus::Online, cpu, mem)
                }
                Liveness::Alive(None) => (ServerStatus::Online, 0.0, 0.0),
                Liveness::Dead => {
                    debug!("Server {} exited outside supervisor control", id);
                    self.bus
                        .console(id, "--- Server Stopped Unexpectedly ---");
                    (ServerStatus::Offline, 0.0, 0.0)
                }
                Liveness::Untracked => (ServerStatus::Offline, 0.0, 0.0),
            };

            {
                let mut history = self.history.write();
                if let Some(h) = history.get_mut(id) {
                    h.push(cpu, mem);
                }
            }

            // Badge consumers get formatted strings; chart consumers get
            // the raw numbers. Both fire every tick for every server.
            self.bus.publish(Event::StatusUpdate {
                id: id.to_string(),
                status: status.as_str().to_string(),
                cpu: format!("{:.2}", cpu),
                mem: format!("{:.2}", mem),
            });
            self.bus.publish(Event::PerformanceUpdate {
                id: id.to_string(),
                cpu,
                mem,
            });
        }
    }

    /// Sample CPU percent and resident memory (MB) for one process
    ///
    /// CPU usage is the delta between two refreshes, so each sample holds
    /// the tick for the sub-interval. Samples are taken sequentially, one
    /// server at a time; tick latency therefore grows with the number of
    /// running servers.
    async fn sample(&self, pid: u32) -> (f64, f64) {
        let pid = Pid::from(pid as usize);
        {
            let mut system = self.system.write();
            system.refresh_process(pid);
        }
        tokio::time::sleep(Duration::from_millis(constants::CPU_SAMPLE_MILLIS)).await;

        let mut system = self.system.write();
        system.refresh_process(pid);
        match system.process(pid) {
            Some(process) => {
                let cpu = round2(process.cpu_usage() as f64);
                let mem = round2(process.memory() as f64 / (1024.0 * 1024.0));
                (cpu, mem)
            }
            None => (0.0, 0.0),
        }
    }

    /// Copy-on-read snapshot of one server's rolling history
    pub fn history_snapshot(&self, id: &str) -> Option<(Vec<f64>, Vec<f64>)> {
        let history = self.history.read();
        history.get(id).map(|h| (h.cpu(), h.mem()))
    }

    /// Most recent sample pair for one server
    pub fn latest(&self, id: &str) -> (f64, f64) {
        let history = self.history.read();
        history.get(id).map(|h| h.latest()).unwrap_or((0.0, 0.0))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
