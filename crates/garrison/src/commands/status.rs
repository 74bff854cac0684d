//! Status command implementation

use anyhow::{bail, Result};
use garrison_ipc::{Request, Response};

use crate::output::{print_error, print_status_table};

pub async fn execute() -> Result<()> {
    let client = super::get_client();

    match client.send(&Request::Status).await? {
        Response::Status { servers } => {
            print_status_table(&servers);
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
