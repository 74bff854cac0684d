//! Schedule command implementations

use anyhow::{bail, Result};
use garrison_core::ScheduleRule;
use garrison_ipc::{Event, Request, Response};

use crate::cli::ScheduleCommands;
use crate::output::{print_error, print_schedule_table, print_success};

pub async fn execute(args: ScheduleCommands) -> Result<()> {
    let client = super::get_client();

    match args {
        ScheduleCommands::Add {
            id,
            action,
            interval,
            unit,
            at,
        } => {
            let rule = ScheduleRule {
                action: action.into(),
                interval,
                unit: unit.into(),
                at_time: at,
            };
            match client.send(&Request::AddSchedule { id, rule }).await? {
                Response::Ok { message } => {
                    print_success(&message);
                    Ok(())
                }
                Response::Error { message } => {
                    print_error(&message);
                    bail!(message)
                }
                _ => unexpected(),
            }
        }

        ScheduleCommands::List { id } => {
            match client.send(&Request::ListSchedules { id }).await? {
                Response::Event {
                    event: Event::ScheduleList { schedules, .. },
                } => {
                    print_schedule_table(&schedules);
                    Ok(())
                }
                Response::Error { message } => {
                    print_error(&message);
                    bail!(message)
                }
                _ => unexpected(),
            }
        }

        ScheduleCommands::Remove { id, index } => {
            // Rules are deleted by value, so fetch the list and pick the
            // rule at the requested index first.
            let rule = match client
                .send(&Request::ListSchedules { id: id.clone() })
                .await?
            {
                Response::Event {
                    event: Event::ScheduleList { schedules, .. },
                } => match schedules.into_iter().nth(index) {
                    Some(rule) => rule,
                    None => {
                        print_error(&format!("No schedule at index {}", index));
                        bail!("No schedule at index {}", index);
                    }
                },
                Response::Error { message } => {
                    print_error(&message);
                    bail!(message);
                }
                _ => return unexpected(),
            };

            match client.send(&Request::DeleteSchedule { id, task: rule }).await? {
                Response::Ok { message } => {
                    print_success(&message);
                    Ok(())
                }
                Response::Error { message } => {
                    print_error(&message);
                    bail!(message)
                }
                _ => unexpected(),
            }
        }
    }
}

fn unexpected() -> Result<()> {
    print_error("Unexpected response from daemon");
    bail!("Unexpected response")
}
