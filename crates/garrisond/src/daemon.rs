//! Main daemon orchestration

use garrison_core::{constants, ConfigStore, Result};
use garrison_ipc::{IpcConnection, IpcServer, Request, Response};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::backup::BackupManager;
use crate::events::EventBus;
use crate::handlers::RequestHandler;
use crate::monitor::Monitor;
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;
use crate::updater::UpdateRunner;

/// Main daemon struct
pub struct Daemon {
    server: IpcServer,
    handler: Arc<RequestHandler>,
    bus: EventBus,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    /// Wire every component together and bind the IPC socket
    pub async fn new() -> Result<Self> {
        let store = Arc::new(ConfigStore::open_default()?);
        store.ensure_defaults()?;
        info!("Configuration store at {}", store.dir().display());

        let bus = EventBus::new(constants::EVENT_CHANNEL_CAPACITY);

        let supervisor = Arc::new(Supervisor::new(Arc::clone(&store), bus.clone()));
        let monitor = Arc::new(Monitor::new(
            Arc::clone(&store),
            supervisor.table(),
            bus.clone(),
        ));
        let backup = Arc::new(BackupManager::new(
            Arc::clone(&store),
            Arc::clone(&supervisor),
            bus.clone(),
        ));
        let updater = Arc::new(UpdateRunner::new(Arc::clone(&store), bus.clone()));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&supervisor),
            Arc::clone(&backup),
            Arc::clone(&updater),
        ));

        // Bring the persisted rules into the live scheduler, then let the
        // background loops run for the life of the daemon.
        scheduler.reload(&store.load_schedules());
        Arc::clone(&monitor).spawn();
        Arc::clone(&scheduler).spawn();

        let handler = Arc::new(RequestHandler::new(
            store,
            supervisor,
            monitor,
            scheduler,
            backup,
            updater,
            bus.clone(),
        ));

        let socket_path = constants::socket_path();
        let server = IpcServer::bind(&socket_path).await?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            server,
            handler,
            bus,
            shutdown_tx,
        })
    }

    /// Accept connections until a kill request arrives
    pub async fn run(&self) -> Result<()> {
        info!("Daemon running, waiting for connections...");
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = self.server.accept() => match accepted {
                    Ok(conn) => {
                        let handler = Arc::clone(&self.handler);
                        let bus = self.bus.clone();
                        let shutdown_tx = self.shutdown_tx.clone();
                        tokio::spawn(async move {
                            handle_connection(conn, handler, bus, shutdown_tx).await;
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested over IPC");
                    return Ok(());
                }
            }
        }
    }
}

/// Serve one connection: request/response, or an event stream after
/// `subscribe`
async fn handle_connection(
    mut conn: IpcConnection,
    handler: Arc<RequestHandler>,
    bus: EventBus,
    shutdown_tx: broadcast::Sender<()>,
) {
    loop {
        match conn.read_request().await {
            Ok(Some(Request::Subscribe)) => {
                stream_events(conn, bus).await;
                return;
            }
            Ok(Some(Request::Kill)) => {
                let _ = conn.send_response(&Response::ok("Daemon shutting down")).await;
                let _ = shutdown_tx.send(());
                return;
            }
            Ok(Some(request)) => {
                let response = handler.handle(request).await;
                if let Err(e) = conn.send_response(&response).await {
                    error!("Failed to send response: {}", e);
                    return;
                }
            }
            Ok(None) => return, // Connection closed
            Err(e) => {
                error!("Error reading request: {}", e);
                let _ = conn.send_response(&Response::error(e.to_string())).await;
                return;
            }
        }
    }
}

/// Forward broadcast events to one observer until it disconnects
///
/// A lagged observer silently loses the oldest events; delivery is
/// at-most-once per connection by design.
async fn stream_events(mut conn: IpcConnection, bus: EventBus) {
    let mut rx = bus.subscribe();
    debug!("Observer subscribed to event stream");

    loop {
        match rx.recv().await {
            Ok(event) => {
                if conn.send_event(event).await.is_err() {
                    debug!("Observer disconnected");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!("Observer lagged, dropped {} events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
