//! Field merge policy for partial security-group records.
//!
//! Merging folds an incoming record (`src`) into an existing one (`self`).
//! Every field group follows its own monotonic rule, so a fact that is
//! already known is never replaced by a weaker one:
//!
//! | Field group          | Rule                                                    |
//! |----------------------|---------------------------------------------------------|
//! | descriptor           | adopt if missing; replace only to backfill a missing id |
//! | creator              | adopt if empty                                          |
//! | creation time        | adopt if `Unknown`/`KnownUnknown`; both `Unknown` → `KnownUnknown` |
//! | is_used              | logical OR                                              |
//! | attached interfaces  | first non-empty list wins                               |
//!
//! Descriptors are compared by pointer identity. Two different descriptors
//! whose group names disagree are a key collision: the descriptor group is
//! left untouched and [`MergeError::KeyCollision`] is returned, but the
//! remaining field groups are still merged.

use std::sync::Arc;

use crate::model::{CreationTime, SecurityGroup};

/// Errors raised while merging two records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Both records carry a descriptor but name different groups.
    #[error("security group key collision: incoming '{incoming}' does not match existing '{existing}'")]
    KeyCollision {
        /// Group name of the descriptor already held by the target.
        existing: String,
        /// Group name of the incoming descriptor.
        incoming: String,
    },
}

impl SecurityGroup {
    /// Fold `src` into `self` according to the per-field rules.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::KeyCollision`] when both sides carry descriptors
    /// naming different groups. All non-descriptor fields are merged anyway.
    pub fn merge_fields(&mut self, src: &Self) -> Result<(), MergeError> {
        let descriptor = self.merge_descriptor(src);

        if self.creator.is_empty() && !src.creator.is_empty() {
            self.creator.clone_from(&src.creator);
        }

        self.merge_creation_time(src.creation_time);

        self.is_used |= src.is_used;

        if self.attached_interfaces.is_empty() && !src.attached_interfaces.is_empty() {
            self.attached_interfaces.clone_from(&src.attached_interfaces);
        }

        descriptor
    }

    fn merge_descriptor(&mut self, src: &Self) -> Result<(), MergeError> {
        let Some(incoming) = src.descriptor.as_ref() else {
            return Ok(());
        };

        let Some(existing) = self.descriptor.as_ref() else {
            self.descriptor = Some(Arc::clone(incoming));
            return Ok(());
        };

        if Arc::ptr_eq(existing, incoming) {
            return Ok(());
        }

        if let (Some(existing_name), Some(incoming_name)) =
            (existing.group_name.as_deref(), incoming.group_name.as_deref())
        {
            if existing_name != incoming_name {
                return Err(MergeError::KeyCollision {
                    existing: existing_name.to_string(),
                    incoming: incoming_name.to_string(),
                });
            }
        }

        // A descriptor without id was built from partial data; the incoming
        // one is authoritative.
        if existing.group_id.is_none() && incoming.group_id.is_some() {
            self.descriptor = Some(Arc::clone(incoming));
        }

        Ok(())
    }

    fn merge_creation_time(&mut self, incoming: CreationTime) {
        match (self.creation_time, incoming) {
            (CreationTime::Unknown, CreationTime::Unknown) => {
                self.creation_time = CreationTime::KnownUnknown;
            }
            (CreationTime::Unknown | CreationTime::KnownUnknown, CreationTime::Unknown) => {}
            (CreationTime::Unknown | CreationTime::KnownUnknown, other) => {
                self.creation_time = other;
            }
            (CreationTime::Known { .. }, _) => {}
        }
    }
}
