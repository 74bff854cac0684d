//! History command implementation

use anyhow::{bail, Result};
use garrison_ipc::{Event, Request, Response};

use crate::output::{print_error, print_history};

pub async fn execute(id: &str) -> Result<()> {
    let client = super::get_client();

    match client
        .send(&Request::GetPerformanceHistory { id: id.to_string() })
        .await?
    {
        Response::Event {
            event: Event::PerformanceHistory { cpu, mem, .. },
        } => {
            print_history(&cpu, &mem);
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
