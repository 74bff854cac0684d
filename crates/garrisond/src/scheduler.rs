//! Task scheduler - recurring maintenance actions
//!
//! Every change to the rule set goes through a full [`Scheduler::reload`]:
//! all jobs are cleared and re-registered from the persisted rules. The
//! driver loop wakes once a second and runs due actions one at a time, in
//! due order, each to completion before the next is considered.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};
use garrison_core::{constants, ScheduleAction, ScheduleRule};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::supervisor::Supervisor;
use crate::updater::UpdateRunner;

struct ScheduledJob {
    server_id: String,
    rule: ScheduleRule,
    next_due: DateTime<Local>,
}

pub struct Scheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
    supervisor: Arc<Supervisor>,
    backup: Arc<BackupManager>,
    updater: Arc<UpdateRunner>,
}

impl Scheduler {
    pub fn new(
        supervisor: Arc<Supervisor>,
        backup: Arc<BackupManager>,
        updater: Arc<UpdateRunner>,
    ) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            supervisor,
            backup,
            updater,
        }
    }

    /// Replace every job with one per persisted rule
    pub fn reload(&self, schedules: &HashMap<String, Vec<ScheduleRule>>) {
        let now = Local::now();
        let mut jobs = Vec::new();
        for (server_id, rules) in schedules {
            for rule in rules {
                match next_due(rule, now) {
                    Some(due) => jobs.push(ScheduledJob {
                        server_id: server_id.clone(),
                        rule: rule.clone(),
                        next_due: due,
                    }),
                    None => warn!(
                        "Ignoring invalid schedule for '{}': {:?}",
                        server_id, rule
                    ),
                }
            }
        }
        info!("Schedules loaded: {} jobs registered", jobs.len());
        *self.jobs.lock() = jobs;
    }

    /// Run the driver loop forever
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(constants::SCHEDULER_TICK_MILLIS));
            loop {
                interval.tick().await;
                self.run_due().await;
            }
        })
    }

    /// Execute every due job, earliest first, one at a time
    pub async fn run_due(&self) {
        loop {
            // Claim the earliest due job and advance its next occurrence
            // before running it, so a long action can not fire twice.
            let claimed = {
                let now = Local::now();
                let mut jobs = self.jobs.lock();
                let due_index = jobs
                    .iter()
                    .enumerate()
                    .filter(|(_, job)| job.next_due <= now)
                    .min_by_key(|(_, job)| job.next_due)
                    .map(|(index, _)| index);

                match due_index {
                    Some(index) => {
                        let fired = (jobs[index].server_id.clone(), jobs[index].rule.clone());
                        match next_due(&jobs[index].rule, now) {
                            Some(due) => jobs[index].next_due = due,
                            None => {
                                jobs.remove(index);
                            }
                        }
                        Some(fired)
                    }
                    None => None,
                }
            };

            let Some((server_id, rule)) = claimed else {
                break;
            };
            self.run_action(&server_id, &rule).await;
        }
    }

    async fn run_action(&self, server_id: &str, rule: &ScheduleRule) {
        info!("Scheduler: running '{}' for server '{}'", rule.action, server_id);
        match rule.action {
            ScheduleAction::Restart => {
                // Only meaningful for a server that is currently up.
                if self.supervisor.is_tracked(server_id) {
                    if let Err(e) = self.supervisor.restart(server_id).await {
                        warn!("Scheduled restart of '{}' failed: {}", server_id, e);
                    }
                }
            }
            ScheduleAction::Update => self.updater.update(server_id).await,
            ScheduleAction::Backup => self.backup.create(server_id, true).await,
        }
    }

    /// Number of registered jobs
    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }
}

/// Next occurrence of a rule strictly after `after`
///
/// Hour rules fire every `interval` hours from now. Day rules pinned to
/// `at_time` fire at the next occurrence of that clock time, then step by
/// `interval` days; unpinned day rules behave like hour rules with a day
/// step. An interval of zero or an unparseable time is invalid.
pub fn next_due(rule: &ScheduleRule, after: DateTime<Local>) -> Option<DateTime<Local>> {
    if rule.interval == 0 {
        return None;
    }
    match rule.unit {
        garrison_core::ScheduleUnit::Hours => {
            Some(after + ChronoDuration::hours(rule.interval as i64))
        }
        garrison_core::ScheduleUnit::Days => match rule.at_time.as_deref() {
            Some(at) => {
                let time = NaiveTime::parse_from_str(at, "%H:%M").ok()?;
                let mut candidate = after
                    .date_naive()
                    .and_time(time)
                    .and_local_timezone(Local)
                    .single()?;
                if candidate <= after {
                    candidate += ChronoDuration::days(rule.interval as i64);
                }
                Some(candidate)
            }
            None => Some(after + ChronoDuration::days(rule.interval as i64)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use garrison_core::ScheduleUnit;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    fn rule(action: ScheduleAction, interval: u32, unit: ScheduleUnit, at_time: Option<&str>) -> ScheduleRule {
        ScheduleRule {
            action,
            interval,
            unit,
            at_time: at_time.map(str::to_string),
        }
    }

    #[test]
    fn test_next_due_hours() {
        let r = rule(ScheduleAction::Restart, 6, ScheduleUnit::Hours, None);
        let due = next_due(&r, at(10, 0)).unwrap();
        assert_eq!(due, at(16, 0));
    }

    #[test]
    fn test_next_due_days_without_time() {
        let r = rule(ScheduleAction::Backup, 2, ScheduleUnit::Days, None);
        let due = next_due(&r, at(10, 0)).unwrap();
        assert_eq!(due, at(10, 0) + ChronoDuration::days(2));
    }

    #[test]
    fn test_next_due_days_at_time_later_today() {
        let r = rule(ScheduleAction::Backup, 1, ScheduleUnit::Days, Some("23:30"));
        let due = next_due(&r, at(10, 0)).unwrap();
        assert_eq!(due, at(23, 30));
    }

    #[test]
    fn test_next_due_days_at_time_already_passed() {
        let r = rule(ScheduleAction::Backup, 3, ScheduleUnit::Days, Some("04:00"));
        let due = next_due(&r, at(10, 0)).unwrap();
        assert_eq!(due, at(4, 0) + ChronoDuration::days(3));
    }

    #[test]
    fn test_next_due_rejects_zero_interval() {
        let r = rule(ScheduleAction::Update, 0, ScheduleUnit::Hours, None);
        assert!(next_due(&r, at(10, 0)).is_none());
    }

    #[test]
    fn test_next_due_rejects_garbage_time() {
        let r = rule(ScheduleAction::Backup, 1, ScheduleUnit::Days, Some("25:99"));
        assert!(next_due(&r, at(10, 0)).is_none());
    }
}
