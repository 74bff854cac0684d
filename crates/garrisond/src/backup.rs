//! Backup and restore - gzipped tar archives of server working directories
//!
//! Every backup and restore across every server serializes through one
//! global lock, acquired without blocking: a second operation fails fast
//! instead of queueing. The lock is an RAII guard, so it is released on
//! every exit path, panics included.

use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use garrison_core::{constants, resolve_within, BackupEntry, ConfigStore, Error, Result};
use garrison_ipc::Event;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::events::EventBus;
use crate::supervisor::Supervisor;

pub struct BackupManager {
    store: Arc<ConfigStore>,
    supervisor: Arc<Supervisor>,
    bus: EventBus,
    /// One holder across all servers, for both backup and restore
    lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(store: Arc<ConfigStore>, supervisor: Arc<Supervisor>, bus: EventBus) -> Self {
        Self {
            store,
            supervisor,
            bus,
            lock: Mutex::new(()),
        }
    }

    /// Archive a server's working directory
    ///
    /// In scheduled mode lock contention is a silent skip instead of a
    /// user-facing error, and a running server is archived as-is.
    pub async fn create(&self, id: &str, scheduled: bool) {
        let Ok(_guard) = self.lock.try_lock() else {
            if scheduled {
                debug!("Skipping scheduled backup for {}: another backup/restore is running", id);
            } else {
                self.bus
                    .notify_error("Another backup or restore is already in progress.");
            }
            return;
        };

        let Some(def) = self.store.get_server(id) else {
            self.bus.notify_error(format!("Server not found: {}", id));
            return;
        };
        if !scheduled && self.supervisor.is_tracked(id) {
            self.bus
                .notify_error("Stop the server before creating a manual backup.");
            return;
        }

        self.bus
            .notify_info("Starting backup... This may take a while.");
        info!("Creating backup for {}", id);

        let root = def.working_directory.clone();
        let outcome = tokio::task::spawn_blocking(move || write_archive(&root)).await;

        match outcome {
            Ok(Ok(filename)) => {
                self.bus
                    .notify_success(format!("Backup created: {}", filename));
                self.publish_backup_list(id);
            }
            Ok(Err(e)) => self.bus.notify_error(format!("Backup failed: {}", e)),
            Err(e) => self.bus.notify_error(format!("Backup failed: {}", e)),
        }
    }

    /// Unpack an archive over a server's working directory, in place
    pub async fn restore(&self, id: &str, filename: &str) {
        let Ok(_guard) = self.lock.try_lock() else {
            self.bus
                .notify_error("Another backup or restore is already in progress.");
            return;
        };

        let Some(def) = self.store.get_server(id) else {
            self.bus.notify_error(format!("Server not found: {}", id));
            return;
        };
        if self.supervisor.is_tracked(id) {
            self.bus
                .notify_error("Stop the server before restoring a backup.");
            return;
        }

        // The filename came over the wire; resolve it like any other
        // sandboxed path so a crafted name can not reach outside backups/.
        let relative = format!("{}/{}", constants::BACKUPS_DIR, filename);
        let archive = match resolve_within(&def.working_directory, &relative) {
            Ok(path) => path,
            Err(e) => {
                self.bus.notify_error(e.to_string());
                return;
            }
        };
        if !archive.is_file() {
            self.bus
                .notify_error(format!("Backup not found: {}", filename));
            return;
        }

        self.bus.notify_info("Starting restore...");
        info!("Restoring {} from {}", id, filename);

        let root = def.working_directory.clone();
        let outcome = tokio::task::spawn_blocking(move || unpack_archive(&archive, &root)).await;

        match outcome {
            Ok(Ok(())) => self.bus.notify_success("Restore complete!"),
            Ok(Err(e)) => self.bus.notify_error(format!("Restore failed: {}", e)),
            Err(e) => self.bus.notify_error(format!("Restore failed: {}", e)),
        }
    }

    /// List a server's archives, newest first
    ///
    /// Read-only, so it does not take the global lock.
    pub fn list(&self, id: &str) -> Result<Vec<BackupEntry>> {
        let def = self
            .store
            .get_server(id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        let backups_dir = resolve_within(&def.working_directory, constants::BACKUPS_DIR)?;
        fs::create_dir_all(&backups_dir)?;

        let suffix = format!(".{}", constants::BACKUP_EXTENSION);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&backups_dir)? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !filename.ends_with(&suffix) {
                continue;
            }
            let metadata = entry.metadata()?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(chrono::DateTime::<Local>::from)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            entries.push(BackupEntry {
                filename,
                size_mb: round2(metadata.len() as f64 / (1024.0 * 1024.0)),
                created_at: created,
            });
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Delete one archive
    pub fn delete(&self, id: &str, filename: &str) -> Result<()> {
        let def = self
            .store
            .get_server(id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))?;
        let relative = format!("{}/{}", constants::BACKUPS_DIR, filename);
        let path = resolve_within(&def.working_directory, &relative)?;
        if !path.is_file() {
            return Err(Error::FileNotFound(path));
        }
        fs::remove_file(&path)?;
        info!("Deleted backup {} for {}", filename, id);
        Ok(())
    }

    /// Broadcast a refreshed archive list for one server
    pub fn publish_backup_list(&self, id: &str) {
        match self.list(id) {
            Ok(backups) => self.bus.publish(Event::BackupList {
                id: id.to_string(),
                backups,
            }),
            Err(e) => warn!("Could not list backups for {}: {}", id, e),
        }
    }
}

/// Write `backup_<timestamp>.tar.gz` into `<root>/backups/`
///
/// The archive lands inside the tree being archived, so the backups
/// directory itself is skipped to keep the file from swallowing itself
/// (and every previous archive with it).
fn write_archive(root: &Path) -> Result<String> {
    let backups_dir = root.join(constants::BACKUPS_DIR);
    fs::create_dir_all(&backups_dir)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let filename = format!(
        "{}{}.{}",
        constants::BACKUP_PREFIX,
        timestamp,
        constants::BACKUP_EXTENSION
    );

    let file = fs::File::create(backups_dir.join(&filename))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == constants::BACKUPS_DIR {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            builder.append_dir_all(PathBuf::from(&name), &path)?;
        } else {
            builder.append_path_with_name(&path, PathBuf::from(&name))?;
        }
    }

    builder.into_inner()?.finish()?;
    Ok(filename)
}

/// Unpack an archive over the working directory, overwriting in place
fn unpack_archive(archive: &Path, root: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let decoder = GzDecoder::new(file);
    let mut unpacker = tar::Archive::new(decoder);
    unpacker.set_overwrite(true);
    unpacker.unpack(root)?;
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
