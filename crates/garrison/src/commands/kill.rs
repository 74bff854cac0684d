//! Kill command implementation

use anyhow::{bail, Result};
use garrison_core::Error;
use garrison_ipc::{Request, Response};

use crate::output::{print_error, print_success};

pub async fn execute() -> Result<()> {
    let client = super::get_client();

    if !client.is_daemon_running() {
        print_success("Daemon is not running");
        return Ok(());
    }

    match client.send(&Request::Kill).await {
        Ok(Response::Ok { message }) => {
            print_success(&message);
            Ok(())
        }
        Ok(Response::Error { message }) => {
            print_error(&message);
            bail!(message)
        }
        Ok(_) => {
            print_error("Unexpected response from daemon");
            bail!("Unexpected response")
        }
        Err(Error::DaemonNotRunning) => {
            print_success("Daemon is not running");
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            bail!(e)
        }
    }
}
