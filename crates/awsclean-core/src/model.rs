//! Security-group records as seen by one reconciliation run.
//!
//! A [`SecurityGroup`] is a *partial* view: each evidence source fills in
//! the fields it knows about and leaves the rest at their "not yet checked"
//! default. Records are combined with [`SecurityGroup::merge_fields`]
//! (see [`crate::merge`]).
//!
//! # Creation time states
//!
//! | State                          | Meaning                                  |
//! |--------------------------------|------------------------------------------|
//! | [`CreationTime::Unknown`]      | nobody has looked yet                    |
//! | [`CreationTime::KnownUnknown`] | looked, could not be determined          |
//! | [`CreationTime::Known`]        | real creation time from the audit trail  |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Resource type the audit trail uses for security groups.
pub const SECURITY_GROUP_RESOURCE_TYPE: &str = "AWS::EC2::SecurityGroup";

/// Audit-trail event name recorded when a security group is created.
pub const SECURITY_GROUP_CREATED_EVENT: &str = "CreateSecurityGroup";

// ---------------------------------------------------------------------------
// CreationTime
// ---------------------------------------------------------------------------

/// Three-state creation time of a security group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CreationTime {
    /// Not checked yet.
    #[default]
    Unknown,
    /// Checked; no source could tell when the group was created.
    KnownUnknown,
    /// Creation time reported by the audit trail.
    Known {
        /// Event time of the creation event.
        at: DateTime<Utc>,
    },
}

impl CreationTime {
    /// Build a [`CreationTime::Known`] value.
    #[must_use]
    pub const fn known(at: DateTime<Utc>) -> Self {
        Self::Known { at }
    }

    /// Map an optional event time to `Known` or `Unknown`.
    #[must_use]
    pub fn from_event_time(at: Option<DateTime<Utc>>) -> Self {
        match at {
            Some(at) => Self::Known { at },
            None => Self::Unknown,
        }
    }

    /// The concrete timestamp, if one is known.
    #[must_use]
    pub fn at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Known { at } => Some(at),
            Self::Unknown | Self::KnownUnknown => None,
        }
    }

    /// `true` unless a real timestamp is present.
    #[must_use]
    pub const fn is_unresolved(self) -> bool {
        !matches!(self, Self::Known { .. })
    }
}

impl fmt::Display for CreationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => Ok(()),
            Self::KnownUnknown => f.write_str("unknown"),
            Self::Known { at } => f.write_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

// ---------------------------------------------------------------------------
// GroupDescriptor
// ---------------------------------------------------------------------------

/// Attributes returned by the describe call for one security group.
///
/// Shared between records through an [`Arc`]; merge compares descriptors by
/// pointer identity, never by content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Immutable group id (`sg-…`).
    pub group_id: Option<String>,
    /// Group name as reported by the API.
    pub group_name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// VPC the group belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Resource tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl GroupDescriptor {
    /// Descriptor carrying only id and name.
    #[must_use]
    pub fn new(group_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            group_name: Some(group_name.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SecurityGroup
// ---------------------------------------------------------------------------

/// One security group as currently known to the run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SecurityGroup {
    /// Merge key. For audit-trail evidence this may hold the group id.
    pub group_name: String,
    /// API descriptor, present once the inventory pass has seen the group.
    pub descriptor: Option<Arc<GroupDescriptor>>,
    /// When the group was created.
    pub creation_time: CreationTime,
    /// Who created the group; empty when unknown.
    pub creator: String,
    /// Set once any network interface attachment was observed.
    pub is_used: bool,
    /// Interfaces attached to the group; empty means "no evidence yet".
    pub attached_interfaces: Vec<String>,
}

impl SecurityGroup {
    /// Record produced by the inventory pass.
    ///
    /// The record's key is the descriptor's group name (empty if the API
    /// omitted it, which `add_or_update` rejects).
    #[must_use]
    pub fn observed(descriptor: GroupDescriptor) -> Self {
        Self {
            group_name: descriptor.group_name.clone().unwrap_or_default(),
            descriptor: Some(Arc::new(descriptor)),
            ..Self::default()
        }
    }

    /// Evidence-only record keyed by a group name or id, without descriptor.
    #[must_use]
    pub fn evidence(key: impl Into<String>) -> Self {
        Self {
            group_name: key.into(),
            ..Self::default()
        }
    }

    /// Attach creation metadata to an evidence record.
    #[must_use]
    pub fn with_creation(mut self, creator: impl Into<String>, creation_time: CreationTime) -> Self {
        self.creator = creator.into();
        self.creation_time = creation_time;
        self
    }

    /// Immutable group id, once an inventory pass has observed the group.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.descriptor
            .as_deref()
            .and_then(|descriptor| descriptor.group_id.as_deref())
    }

    /// Group name from the descriptor, falling back to the record key.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.descriptor
            .as_deref()
            .and_then(|descriptor| descriptor.group_name.as_deref())
            .unwrap_or(&self.group_name)
    }
}
