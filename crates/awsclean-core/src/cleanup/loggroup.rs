use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span};

use crate::api::{LogGroup, LogGroupApi, collect_pages};
use crate::duration::cutoff;
use crate::error::CleanError;
use crate::pattern::IgnorePatterns;
use crate::report::DeletionReport;

/// Log groups older than the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogGroupInventory {
    /// Old groups matching no ignore pattern.
    pub candidates: Vec<LogGroup>,
    /// Old groups kept because of an ignore pattern.
    pub ignored: Vec<LogGroup>,
}

/// CloudWatch log-group cleanup.
#[derive(Debug, Clone, Default)]
pub struct LogGroupCleaner {
    pub older_then: Duration,
    pub dry_run: bool,
    pub ignore: IgnorePatterns,
}

impl LogGroupCleaner {
    /// List log groups created before `now - older_then`.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::LogGroups`] when a listing page fails.
    pub fn collect<A>(&self, api: &A, now: DateTime<Utc>) -> Result<LogGroupInventory, CleanError>
    where
        A: LogGroupApi + ?Sized,
    {
        let _span = info_span!("log_groups").entered();
        let older_then_date = cutoff(now, self.older_then);

        let groups = collect_pages(|token| api.describe_log_groups(token)).map_err(CleanError::LogGroups)?;
        let mut inventory = LogGroupInventory::default();
        for group in groups {
            let old_enough = group.creation_time.is_some_and(|created| created < older_then_date);
            if !old_enough {
                continue;
            }
            if self.ignore.matches_any(&group.name) {
                debug!(log_group = %group.name, "ignored");
                inventory.ignored.push(group);
            } else {
                debug!(log_group = %group.name, "candidate");
                inventory.candidates.push(group);
            }
        }
        Ok(inventory)
    }

    /// Delete every candidate. In dry-run mode no call is made, since the
    /// API offers no dry-run flag.
    ///
    /// # Errors
    ///
    /// Propagates listing errors from [`LogGroupCleaner::collect`].
    pub fn delete<A>(&self, api: &A, now: DateTime<Utc>) -> Result<DeletionReport, CleanError>
    where
        A: LogGroupApi + ?Sized,
    {
        let inventory = self.collect(api, now)?;
        let _span = info_span!("delete", dry_run = self.dry_run).entered();
        let mut report = DeletionReport::new(self.dry_run);

        for group in &inventory.ignored {
            report.push_skipped(&group.name, &group.name, "ignored");
        }

        for group in &inventory.candidates {
            let name = group.name.as_str();
            if self.dry_run {
                info!(log_group = %name, "dry run, would delete log group");
                report.push_deleted(name, name);
                continue;
            }

            info!(log_group = %name, "deleting log group");
            match api.delete_log_group(name) {
                Ok(()) => report.push_deleted(name, name),
                Err(err) => {
                    error!(log_group = %name, error = %err, "error deleting log group");
                    report.push_failed(name, name, err.to_string());
                }
            }
        }

        info!("{}", report.summary());
        Ok(report)
    }
}
