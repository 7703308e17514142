//! Cloud collaborator interfaces consumed by the cleanup flows.
//!
//! Every call is synchronous and blocking from the caller's point of view.
//! Implementations live outside this crate (the CLI ships one backed by the
//! AWS SDK); tests use scripted fakes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::GroupDescriptor;

/// Transport or service failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct ApiError {
    /// API operation that failed, e.g. `DescribeSecurityGroups`.
    pub operation: &'static str,
    /// Human-readable failure description.
    pub message: String,
    /// Service error code when the provider returned one.
    pub code: Option<String>,
}

impl ApiError {
    /// Error without a service code.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            code: None,
        }
    }

    /// Attach the provider's error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// A page followed by another one.
    #[must_use]
    pub fn more(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Security groups and audit trail
// ---------------------------------------------------------------------------

/// EC2 operations needed for security-group cleanup.
pub trait SecurityGroupApi {
    /// One page of security-group descriptors.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn describe_security_groups(&self, next_token: Option<&str>) -> Result<Page<GroupDescriptor>, ApiError>;

    /// Ids of network interfaces attached to the named group.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the lookup fails.
    fn attached_interfaces(&self, group_name: &str) -> Result<Vec<String>, ApiError>;

    /// Delete a group. With `dry_run` the provider validates the request
    /// without deleting.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the provider refuses the request.
    fn delete_security_group(&self, group_id: &str, dry_run: bool) -> Result<(), ApiError>;
}

/// Resource referenced by an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResource {
    /// Resource type, e.g. `AWS::EC2::SecurityGroup`.
    pub resource_type: String,
    /// Resource name or id.
    pub resource_name: String,
}

/// One "group created" event from the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Identity that issued the call.
    pub username: String,
    /// When the event happened.
    pub event_time: Option<DateTime<Utc>>,
    /// Resources the event touched.
    pub resources: Vec<AuditResource>,
}

/// Audit-trail lookup with a bounded retention window.
pub trait AuditTrailApi {
    /// One page of security-group creation events in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the lookup fails, including throttling.
    fn lookup_creation_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<Page<AuditEvent>, ApiError>;
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Machine image as described by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image id (`ami-…`).
    pub image_id: String,
    /// Image name.
    pub name: String,
    /// Creation date as reported by the API, e.g. `2024-01-31T10:00:00.000Z`.
    pub creation_date: String,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// EC2 operations needed for image cleanup.
pub trait ImageApi {
    /// Images owned by any of `owners` (`self` or account ids).
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn describe_images(&self, owners: &[String]) -> Result<Vec<Image>, ApiError>;

    /// One page of image ids referenced by instances.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn instance_image_ids(&self, next_token: Option<&str>) -> Result<Page<String>, ApiError>;

    /// One page of image ids referenced by `$Latest` launch template versions.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn launch_template_image_ids(&self, next_token: Option<&str>) -> Result<Page<String>, ApiError>;

    /// Deregister an image.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the provider refuses the request.
    fn deregister_image(&self, image_id: &str, dry_run: bool) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

/// Block storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume id (`vol-…`).
    pub volume_id: String,
    /// Provider state, e.g. `available` or `in-use`.
    pub state: String,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gib: Option<i32>,
}

impl Volume {
    /// State string of attached volumes.
    pub const IN_USE: &'static str = "in-use";

    /// `true` when the volume is attached to an instance.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.state == Self::IN_USE
    }
}

/// EC2 operations needed for volume cleanup.
pub trait VolumeApi {
    /// One page of volumes.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn describe_volumes(&self, next_token: Option<&str>) -> Result<Page<Volume>, ApiError>;

    /// Delete a volume.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the provider refuses the request.
    fn delete_volume(&self, volume_id: &str, dry_run: bool) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Log groups
// ---------------------------------------------------------------------------

/// Log group as described by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroup {
    /// Log group name.
    pub name: String,
    /// Creation time.
    pub creation_time: Option<DateTime<Utc>>,
    /// Retention setting in days; `None` means "never expire".
    pub retention_days: Option<i32>,
}

/// Log operations needed for log-group cleanup.
pub trait LogGroupApi {
    /// One page of log groups.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the describe call fails.
    fn describe_log_groups(&self, next_token: Option<&str>) -> Result<Page<LogGroup>, ApiError>;

    /// Delete a log group. The API has no dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the provider refuses the request.
    fn delete_log_group(&self, name: &str) -> Result<(), ApiError>;
}

/// Drain a paginated listing, stopping at the first failed page.
///
/// # Errors
///
/// Propagates the first page error; items gathered so far are dropped.
pub fn collect_pages<T>(
    mut fetch: impl FnMut(Option<&str>) -> Result<Page<T>, ApiError>,
) -> Result<Vec<T>, ApiError> {
    let mut items = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let page = fetch(next_token.as_deref())?;
        items.extend(page.items);
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(items),
        }
    }
}
