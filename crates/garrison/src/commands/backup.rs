//! Backup command implementations

use anyhow::{bail, Result};
use garrison_ipc::{Event, Request, Response};

use crate::cli::BackupCommands;
use crate::output::{print_backup_table, print_error, print_info, print_success};

pub async fn execute(args: BackupCommands) -> Result<()> {
    let client = super::get_client();

    let request = match &args {
        BackupCommands::Create { id } => Request::CreateBackup { id: id.clone() },
        BackupCommands::List { id } => Request::ListBackups { id: id.clone() },
        BackupCommands::Restore { id, filename } => Request::RestoreBackup {
            id: id.clone(),
            filename: filename.clone(),
        },
        BackupCommands::Delete { id, filename } => Request::DeleteBackup {
            id: id.clone(),
            filename: filename.clone(),
        },
    };

    match client.send(&request).await? {
        Response::Ok { message } => {
            match args {
                BackupCommands::Create { .. } => print_info(
                    "Backup started; follow `garrison attach` for progress and the result",
                ),
                BackupCommands::Restore { .. } => print_info(
                    "Restore started; follow `garrison attach` for progress and the result",
                ),
                _ => print_success(&message),
            }
            Ok(())
        }
        Response::Event {
            event: Event::BackupList { backups, .. },
        } => {
            print_backup_table(&backups);
            Ok(())
        }
        Response::Error { message } => {
            print_error(&message);
            bail!(message)
        }
        _ => {
            print_error("Unexpected response from daemon");
            bail!("Unexpected response")
        }
    }
}
