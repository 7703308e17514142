//! Security-group cleanup run: collect, reconcile, classify, delete.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{AuditTrailApi, SecurityGroupApi};
use crate::collect::{DEFAULT_AUDIT_PAGE_DELAY, UsageSplit, audit_trail_pass, inventory_pass, usage_pass};
use crate::error::CleanError;
use crate::model::SecurityGroup;
use crate::reconcile::{RETENTION_CEILING, ReconcileOutcome, TimeWindow, reconcile};
use crate::registry::SecurityGroups;
use crate::report::DeletionReport;
use crate::select::delete_selected;

/// Settings of one security-group run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityGroupCleaner {
    /// Only groups created longer ago than this are deleted.
    pub older_then: Option<Duration>,
    /// Pass the dry-run flag to every delete call.
    pub dry_run: bool,
    /// Listing shows unused groups only.
    pub only_unused: bool,
    /// How far back the audit trail remembers.
    pub retention: Duration,
    /// Delay before each audit-trail page.
    pub page_delay: Duration,
}

impl Default for SecurityGroupCleaner {
    fn default() -> Self {
        Self {
            older_then: None,
            dry_run: false,
            only_unused: false,
            retention: RETENTION_CEILING,
            page_delay: DEFAULT_AUDIT_PAGE_DELAY,
        }
    }
}

/// Result of [`SecurityGroupCleaner::collect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Every reconciled group.
    pub groups: SecurityGroups,
    /// Used/unused classification, when usage was determined.
    pub usage: Option<UsageSplit>,
    /// What reconciliation changed.
    pub outcome: ReconcileOutcome,
    only_unused: bool,
}

impl Reconciled {
    /// Groups to show: unused ones first, then used ones unless only unused
    /// groups were requested. Without a usage split, every group.
    #[must_use]
    pub fn listing(&self) -> Vec<&SecurityGroup> {
        match &self.usage {
            Some(split) if self.only_unused => split.unused.iter().collect(),
            Some(split) => split.unused.iter().chain(split.used.iter()).collect(),
            None => self.groups.iter().collect(),
        }
    }
}

impl SecurityGroupCleaner {
    /// Usage is determined only when it can change the outcome.
    #[must_use]
    pub const fn needs_usage(&self) -> bool {
        self.only_unused || self.older_then.is_some()
    }

    /// Run the audit-trail and inventory passes, reconcile them and, when
    /// needed, classify groups by usage.
    ///
    /// # Errors
    ///
    /// - [`CleanError::Inventory`] when the group listing fails.
    /// - [`CleanError::Usage`] when an attachment lookup fails.
    pub fn collect<A, T>(&self, api: &A, trail: &T, window: TimeWindow, now: DateTime<Utc>) -> Result<Reconciled, CleanError>
    where
        A: SecurityGroupApi + ?Sized,
        T: AuditTrailApi + ?Sized,
    {
        let evidence = audit_trail_pass(trail, window.start(), window.end(), self.page_delay);

        let mut groups = SecurityGroups::new();
        for collision in groups.append_all(inventory_pass(api).map_err(CleanError::Inventory)?) {
            debug!(error = %collision, "inventory consolidation");
        }

        let outcome = reconcile(&mut groups, evidence, window, now, self.retention);
        info!(
            groups = groups.len(),
            stale = outcome.stale.len(),
            dropped = outcome.dropped.len(),
            "reconciled security groups"
        );

        let usage = if self.needs_usage() {
            Some(usage_pass(api, &groups)?)
        } else {
            None
        };

        Ok(Reconciled {
            groups,
            usage,
            outcome,
            only_unused: self.only_unused,
        })
    }

    /// Collect, then delete the selected groups.
    ///
    /// Candidates are the unused groups, or every group when usage was not
    /// determined.
    ///
    /// # Errors
    ///
    /// Propagates [`SecurityGroupCleaner::collect`] errors. Per-group delete
    /// failures are recorded in the report instead.
    pub fn delete<A, T>(&self, api: &A, trail: &T, window: TimeWindow, now: DateTime<Utc>) -> Result<DeletionReport, CleanError>
    where
        A: SecurityGroupApi + ?Sized,
        T: AuditTrailApi + ?Sized,
    {
        let reconciled = self.collect(api, trail, window, now)?;
        let report = match &reconciled.usage {
            Some(split) => delete_selected(api, &split.unused, Some(&split.used), self.older_then, self.dry_run, now),
            None => delete_selected(api, &reconciled.groups, None, self.older_then, self.dry_run, now),
        };
        Ok(report)
    }
}
