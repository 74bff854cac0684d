//! Terminal output formatting

use colored::Colorize;
use garrison_core::{BackupEntry, ScheduleRule};
use garrison_ipc::{Event, ServerSummary};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

#[derive(Tabled)]
pub struct StatusRow {
    #[tabled(rename = "id")]
    pub id: String,
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "status")]
    pub status: String,
    #[tabled(rename = "cpu")]
    pub cpu: String,
    #[tabled(rename = "mem")]
    pub mem: String,
}

impl From<&ServerSummary> for StatusRow {
    fn from(summary: &ServerSummary) -> Self {
        let status = match summary.status.as_str() {
            "online" => "online".green().to_string(),
            _ => "offline".red().to_string(),
        };
        StatusRow {
            id: summary.id.clone(),
            name: summary.name.clone(),
            status,
            cpu: format!("{:.1}%", summary.cpu),
            mem: format!("{:.1}M", summary.mem),
        }
    }
}

pub fn print_status_table(servers: &[ServerSummary]) {
    if is_json_mode() {
        print_json(servers);
        return;
    }

    if servers.is_empty() {
        println!("No servers defined");
        return;
    }

    let rows: Vec<StatusRow> = servers.iter().map(StatusRow::from).collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::left()))
        .to_string();
    println!("{}", table);
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "filename")]
    filename: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "created")]
    created: String,
}

pub fn print_backup_table(backups: &[BackupEntry]) {
    if is_json_mode() {
        print_json(backups);
        return;
    }

    if backups.is_empty() {
        println!("No backups yet");
        return;
    }

    let rows: Vec<BackupRow> = backups
        .iter()
        .map(|b| BackupRow {
            filename: b.filename.clone(),
            size: format!("{:.2}M", b.size_mb),
            created: b.created_at.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[derive(Tabled)]
struct ScheduleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "every")]
    every: String,
    #[tabled(rename = "at")]
    at: String,
}

pub fn print_schedule_table(schedules: &[ScheduleRule]) {
    if is_json_mode() {
        print_json(schedules);
        return;
    }

    if schedules.is_empty() {
        println!("No schedules configured");
        return;
    }

    let rows: Vec<ScheduleRow> = schedules
        .iter()
        .enumerate()
        .map(|(index, rule)| ScheduleRow {
            index,
            action: rule.action.to_string(),
            every: format!("{} {}", rule.interval, rule.unit),
            at: rule.at_time.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "cpu %")]
    cpu: String,
    #[tabled(rename = "mem MB")]
    mem: String,
}

/// Print the rolling history, oldest sample first
pub fn print_history(cpu: &[f64], mem: &[f64]) {
    if is_json_mode() {
        #[derive(Serialize)]
        struct HistoryJson<'a> {
            cpu: &'a [f64],
            mem: &'a [f64],
        }
        print_json(&HistoryJson { cpu, mem });
        return;
    }

    let rows: Vec<SampleRow> = cpu
        .iter()
        .zip(mem.iter())
        .enumerate()
        .map(|(index, (c, m))| SampleRow {
            index,
            cpu: format!("{:.2}", c),
            mem: format!("{:.2}", m),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Render one streamed event as a console line, if it is worth showing
pub fn format_event(event: &Event, filter_id: Option<&str>) -> Option<String> {
    let matches = |id: &str| filter_id.map_or(true, |f| f == id);
    match event {
        Event::ConsoleOutput { id, data } if matches(id) => {
            Some(format!("{} {}", format!("[{}]", id).cyan(), data))
        }
        // Installer contexts are derived from server ids ("updater_<id>"),
        // so substring matching keeps them visible under a server filter.
        Event::InstallerOutput { data, context_id }
            if filter_id.map_or(true, |f| context_id.contains(f)) =>
        {
            Some(format!("{} {}", format!("[{}]", context_id).yellow(), data))
        }
        Event::Notification { status, message } => {
            let badge = match status.as_str() {
                "success" => "✓".green().to_string(),
                "error" => "✗".red().to_string(),
                _ => "ℹ".blue().to_string(),
            };
            Some(format!("{} {}", badge, message))
        }
        _ => None,
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_ipc::NotifyStatus;

    #[test]
    fn test_json_mode_toggle() {
        set_json_mode(false);
        assert!(!is_json_mode());
        set_json_mode(true);
        assert!(is_json_mode());
        set_json_mode(false);
    }

    #[test]
    fn test_format_event_filters_console_output() {
        let event = Event::ConsoleOutput {
            id: "s1".to_string(),
            data: "hello".to_string(),
        };
        assert!(format_event(&event, None).is_some());
        assert!(format_event(&event, Some("s1")).is_some());
        assert!(format_event(&event, Some("s2")).is_none());
    }

    #[test]
    fn test_format_event_skips_chart_payloads() {
        let event = Event::PerformanceUpdate {
            id: "s1".to_string(),
            cpu: 1.0,
            mem: 2.0,
        };
        assert!(format_event(&event, None).is_none());
    }

    #[test]
    fn test_format_event_notifications_always_shown() {
        let event = Event::Notification {
            status: NotifyStatus::Error,
            message: "Backup failed".to_string(),
        };
        let line = format_event(&event, Some("s1")).unwrap();
        assert!(line.contains("Backup failed"));
    }
}
