//! Reconciliation of audit-trail evidence with the inventory.
//!
//! The audit trail only remembers a fixed period (90 days). When the lookup
//! window lies entirely inside that period, an inventory group the trail does
//! not mention is treated as inconsistent (deleted or recreated while the
//! passes ran) and dropped from the result. When the window reaches further
//! back than the trail can see, or when the trail lookup stopped on a failed
//! page, such groups are kept and their creation time is marked "known
//! unknown".

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::collect::TrailEvidence;
use crate::duration::cutoff;
use crate::model::SecurityGroup;
use crate::registry::SecurityGroups;

/// How far back the audit trail remembers events.
pub const RETENTION_CEILING: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// `end` is before `start`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time window: end {end} is before start {start}")]
pub struct InvalidWindow {
    /// Requested start.
    pub start: DateTime<Utc>,
    /// Requested end.
    pub end: DateTime<Utc>,
}

/// Closed lookup window for audit-trail events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindow`] when `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if end < start {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window `[now - lookback, now]`.
    #[must_use]
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: cutoff(now, lookback),
            end: now,
        }
    }

    /// Start of the window.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the window.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `true` when `start` lies strictly after `now - retention`.
    #[must_use]
    pub fn within_retention(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.start > cutoff(now, retention)
    }
}

/// What reconciliation did to the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// Trail entries with no inventory counterpart; never inserted.
    pub stale: Vec<String>,
    /// Inventory entries the trail did not mention, dropped because the
    /// window is fully covered by the trail.
    pub dropped: Vec<String>,
    /// Inventory entries the trail did not mention, kept with a "known
    /// unknown" creation time.
    pub marked_unknown: Vec<String>,
}

/// Fold audit-trail evidence into `inventory`.
///
/// 1. Trail records matching an inventory entry (by name or id) are merged.
///    The rest are stale and reported, never inserted.
/// 2. Inventory entries the trail did not mention are dropped when the trail
///    was read completely and the window lies within `retention` of `now`
///    (strictly after the ceiling). Otherwise they are merged with empty
///    creation evidence, which marks their creation time "known unknown".
pub fn reconcile(
    inventory: &mut SecurityGroups,
    trail: TrailEvidence,
    window: TimeWindow,
    now: DateTime<Utc>,
    retention: Duration,
) -> ReconcileOutcome {
    let _span = info_span!("reconcile").entered();

    let TrailEvidence { groups: trail, complete } = trail;
    let unconfirmed = inventory.unconfirmed_by(&trail);
    let stale = inventory.update_if_exists(trail);
    for name in stale.names() {
        info!(group = %name, "audit trail names a group missing from inventory");
    }

    let mut outcome = ReconcileOutcome {
        stale: stale.names().map(str::to_owned).collect(),
        ..ReconcileOutcome::default()
    };

    let covered = window.within_retention(now, retention);
    if covered && !complete {
        warn!(count = unconfirmed.len(), "audit trail incomplete, keeping groups it did not mention");
    }

    if covered && complete {
        debug!(count = unconfirmed.len(), "dropping groups unknown to the audit trail");
        inventory.delete_skipped(&unconfirmed);
        outcome.dropped = unconfirmed.names().map(str::to_owned).collect();
    } else {
        let unresolved: SecurityGroups = unconfirmed.names().map(SecurityGroup::evidence).collect();
        debug!(count = unresolved.len(), "keeping unconfirmed groups with unknown creation time");
        inventory.update_if_exists(unresolved);
        outcome.marked_unknown = unconfirmed.names().map(str::to_owned).collect();
    }

    outcome
}
