//! File browsing command implementations

use anyhow::{bail, Result};
use colored::Colorize;
use garrison_ipc::{Event, Request, Response};

use crate::cli::FileCommands;
use crate::output::print_error;

pub async fn execute(args: FileCommands) -> Result<()> {
    let client = super::get_client();

    match args {
        FileCommands::Ls { id, path } => {
            match client.send(&Request::ListFiles { id, path }).await? {
                Response::Event {
                    event: Event::FileList { dirs, files, .. },
                } => {
                    for dir in dirs {
                        println!("{}/", dir.blue());
                    }
                    for file in files {
                        println!("{}", file);
                    }
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

        FileCommands::Cat { id, path } => {
            match client.send(&Request::GetFileContent { id, path }).await? {
                Response::Event {
                    event: Event::FileContent { content, error, .. },
                } => {
                    if let Some(error) = error {
                        print_error(&error);
                        bail!(error);
                    }
                    print!("{}", content.unwrap_or_default());
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
    }
}
