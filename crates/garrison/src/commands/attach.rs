//! Attach command implementation - follow the daemon's event stream

use anyhow::Result;
use garrison_ipc::{Request, Response};

use crate::output::{format_event, print_info};

pub async fn execute(filter_id: Option<&str>) -> Result<()> {
    let client = super::get_client();

    match filter_id {
        Some(id) => print_info(&format!("Attached to {} (ctrl-c to detach)", id)),
        None => print_info("Attached to all servers (ctrl-c to detach)"),
    }

    client
        .send_streaming(&Request::Subscribe, |response| {
            if let Response::Event { event } = response {
                if let Some(line) = format_event(&event, filter_id) {
                    println!("{}", line);
                }
            }
            true // Stream until the daemon goes away or the user interrupts
        })
        .await?;

    Ok(())
}
