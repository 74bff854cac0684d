//! Stop command implementation

use anyhow::{bail, Result};
use garrison_ipc::{Request, Response};

use crate::output::{print_error, print_success};

pub async fn execute(id: &str) -> Result<()> {
    let client = super::get_client();

    match client
        .send(&Request::StopServer { id: id.to_string() })
        .await?
    {
        Response::Ok { .. } => {
            print_success(&format!("Stop requested for {}", id));
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
