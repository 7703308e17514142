//! Deletion selector for reconciled security groups.
//!
//! With an age threshold, only groups with a real creation time older than
//! the threshold are deleted; an unknown creation time never qualifies.
//! Without a threshold every candidate is deleted regardless of age.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, info, info_span};

use crate::api::SecurityGroupApi;
use crate::duration::{cutoff, format_duration};
use crate::model::SecurityGroup;
use crate::registry::SecurityGroups;
use crate::report::DeletionReport;

/// Verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Issue the delete call.
    Delete,
    /// A threshold was given but the creation time is not known.
    SkipUnknownAge,
    /// Created after the threshold cutoff.
    SkipTooRecent {
        /// Creation time of the group.
        created: DateTime<Utc>,
    },
}

/// Decide whether `record` is old enough to delete.
#[must_use]
pub fn select(record: &SecurityGroup, older_then: Option<Duration>, now: DateTime<Utc>) -> Selection {
    let Some(age) = older_then else {
        return Selection::Delete;
    };
    match record.creation_time.at() {
        None => Selection::SkipUnknownAge,
        Some(created) if created < cutoff(now, age) => Selection::Delete,
        Some(created) => Selection::SkipTooRecent { created },
    }
}

/// Delete every selected candidate.
///
/// `dry_run` is passed through to the delete call, which still runs. Groups
/// in `used` are never deleted. A failing delete is logged and recorded; the
/// loop continues with the next candidate.
#[must_use]
pub fn delete_selected<A>(
    api: &A,
    candidates: &SecurityGroups,
    used: Option<&SecurityGroups>,
    older_then: Option<Duration>,
    dry_run: bool,
    now: DateTime<Utc>,
) -> DeletionReport
where
    A: SecurityGroupApi + ?Sized,
{
    let _span = info_span!("delete", dry_run).entered();
    let mut report = DeletionReport::new(dry_run);

    if older_then.is_none() {
        info!("no age threshold set, ignoring creation time of security groups");
    }

    for group in candidates {
        let name = group.display_name();
        let id = group.group_id().unwrap_or_default();

        match select(group, older_then, now) {
            Selection::Delete => {}
            Selection::SkipUnknownAge => {
                info!(group_id = %id, group_name = %name, "skipping, creation time unknown");
                report.push_skipped(id, name, "creation time unknown");
                continue;
            }
            Selection::SkipTooRecent { created } => {
                let created = created.to_rfc3339_opts(SecondsFormat::Secs, true);
                let threshold = older_then.map(format_duration).unwrap_or_default();
                info!(group_id = %id, group_name = %name, %created, "skipping, newer than {threshold}");
                report.push_skipped(id, name, format!("created {created}, newer than {threshold}"));
                continue;
            }
        }

        if id.is_empty() {
            error!(group_name = %name, "can not delete security group without group id");
            report.push_failed(id, name, "no group id");
            continue;
        }

        info!(group_id = %id, group_name = %name, "deleting security group");
        match api.delete_security_group(id, dry_run) {
            Ok(()) => report.push_deleted(id, name),
            Err(err) => {
                error!(group_id = %id, group_name = %name, error = %err, "error deleting security group");
                report.push_failed(id, name, err.to_string());
            }
        }
    }

    for group in used.into_iter().flatten() {
        let id = group.group_id().unwrap_or_default();
        info!(group_id = %id, group_name = %group.display_name(), "security group is in use, not deleting");
        report.push_skipped(id, group.display_name(), "in use");
    }

    info!("{}", report.summary());
    report
}
