//! Send command implementation

use anyhow::{bail, Result};
use garrison_ipc::{Request, Response};

use crate::output::{print_error, print_success};

pub async fn execute(id: &str, command: &str) -> Result<()> {
    let client = super::get_client();

    match client
        .send(&Request::SendCommand {
            id: id.to_string(),
            command: command.to_string(),
        })
        .await?
    {
        Response::Ok { .. } => {
            print_success(&format!("Sent to {}: {}", id, command));
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
