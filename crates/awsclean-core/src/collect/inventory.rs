use tracing::{debug, error, info_span};

use crate::api::{ApiError, SecurityGroupApi};
use crate::model::SecurityGroup;
use crate::registry::SecurityGroups;

/// List every security group in the account.
///
/// The inventory is the authoritative resource list, so a failing page aborts
/// the pass. Records the registry rejects are logged and left out.
///
/// # Errors
///
/// Returns the first [`ApiError`] raised by the describe call.
pub fn inventory_pass<A>(api: &A) -> Result<SecurityGroups, ApiError>
where
    A: SecurityGroupApi + ?Sized,
{
    let _span = info_span!("inventory").entered();

    let mut groups = SecurityGroups::new();
    let mut next_token: Option<String> = None;
    let mut pages = 0_usize;
    loop {
        let page = api.describe_security_groups(next_token.as_deref())?;
        pages += 1;
        for descriptor in page.items {
            let group_id = descriptor.group_id.clone().unwrap_or_default();
            if let Err(err) = groups.add_or_update(SecurityGroup::observed(descriptor)) {
                error!(group_id = %group_id, error = %err, "inventory: rejected security group");
            }
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    debug!(pages, groups = groups.len(), "inventory complete");
    Ok(groups)
}
