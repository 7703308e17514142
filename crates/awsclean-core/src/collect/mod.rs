//! Evidence collectors.
//!
//! Three independent passes, each producing a partial view of the account's
//! security groups:
//!
//! - [`inventory_pass`]: the describe call; authoritative, fails as a whole.
//! - [`usage_pass`]: one attachment lookup per group; all or nothing, with
//!   the partial split attached to the error.
//! - [`audit_trail_pass`]: creation events; best effort, a failed page ends
//!   pagination.

mod audit;
mod inventory;
mod usage;

pub use audit::{DEFAULT_AUDIT_PAGE_DELAY, TrailEvidence, audit_trail_pass, evidence_from_events};
pub use inventory::inventory_pass;
pub use usage::{UsageError, UsageSplit, usage_pass};
