//! Update command implementation

use anyhow::{bail, Result};
use garrison_ipc::{Request, Response};

use crate::output::{print_error, print_info};

pub async fn execute(id: &str) -> Result<()> {
    let client = super::get_client();

    match client
        .send(&Request::UpdateServer { id: id.to_string() })
        .await?
    {
        Response::Ok { .. } => {
            print_info(&format!(
                "Update started for {}; follow `garrison attach` for the tool output",
                id
            ));
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
