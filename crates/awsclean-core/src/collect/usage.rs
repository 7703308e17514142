use tracing::{debug, error, info_span};

use crate::api::{ApiError, SecurityGroupApi};
use crate::registry::SecurityGroups;

/// Groups split by whether any network interface is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSplit {
    /// Groups with at least one attached interface.
    pub used: SecurityGroups,
    /// Groups without attachments.
    pub unused: SecurityGroups,
}

/// An attachment lookup failed; usage could not be determined completely.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not determine usage of security group '{group_name}': {source}")]
pub struct UsageError {
    /// Group whose lookup failed.
    pub group_name: String,
    /// Underlying lookup failure.
    #[source]
    pub source: ApiError,
    /// Split accumulated before the failure.
    pub partial: Box<UsageSplit>,
}

/// Classify every group of `groups` as used or unused.
///
/// Issues one attachment lookup per group. Used records get `is_used` set and
/// their interface ids attached.
///
/// # Errors
///
/// The first failing lookup aborts the pass; [`UsageError::partial`] holds
/// what was classified before it.
pub fn usage_pass<A>(api: &A, groups: &SecurityGroups) -> Result<UsageSplit, UsageError>
where
    A: SecurityGroupApi + ?Sized,
{
    let _span = info_span!("usage").entered();

    let mut split = UsageSplit::default();
    for group in groups {
        let name = group.display_name();
        let interfaces = match api.attached_interfaces(name) {
            Ok(interfaces) => interfaces,
            Err(source) => {
                return Err(UsageError {
                    group_name: name.to_string(),
                    source,
                    partial: Box::new(split),
                });
            }
        };

        let mut record = group.clone();
        let target = if interfaces.is_empty() {
            debug!(group_name = %name, "no interface attached");
            &mut split.unused
        } else {
            record.is_used = true;
            record.attached_interfaces = interfaces;
            &mut split.used
        };
        if let Err(err) = target.add_or_update(record) {
            error!(group_name = %name, error = %err, "usage: could not record group");
        }
    }

    debug!(used = split.used.len(), unused = split.unused.len(), "usage complete");
    Ok(split)
}
