//! Command implementations

pub mod attach;
pub mod backup;
pub mod files;
pub mod history;
pub mod kill;
pub mod ping;
pub mod restart;
pub mod schedule;
pub mod send;
pub mod start;
pub mod status;
pub mod stop;
pub mod update;

use garrison_core::constants;
use garrison_ipc::IpcClient;

/// Get the IPC client
pub fn get_client() -> IpcClient {
    IpcClient::new(constants::socket_path())
}
