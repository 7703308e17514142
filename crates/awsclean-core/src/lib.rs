//! awsclean-core library.
//!
//! Finds unused AWS resources and deletes them. The interesting part is the
//! security-group run, which reconciles three partial views of each group:
//!
//! 1. inventory (describe call), via [`collect::inventory_pass`]
//! 2. creation metadata (audit trail), via [`collect::audit_trail_pass`]
//! 3. usage (attached network interfaces), via [`collect::usage_pass`]
//!
//! Records are combined by [`SecurityGroup::merge_fields`] inside a
//! [`SecurityGroups`] registry, pruned by [`reconcile::reconcile`] and fed to
//! the deletion selector in [`select`]. [`SecurityGroupCleaner`] runs the
//! whole sequence.
//!
//! Cloud access goes through the traits in [`api`]; nothing here talks to AWS
//! directly.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern, each mapped to an [`ErrorCode`].
//! - **Logging**: `tracing` macros inside one span per pass.

pub mod api;
pub mod cleanup;
pub mod collect;
pub mod config;
pub mod duration;
pub mod error;
pub mod merge;
pub mod model;
pub mod pattern;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod secgrp;
pub mod select;

pub use error::{CleanError, ErrorCode};
pub use model::{CreationTime, GroupDescriptor, SecurityGroup};
pub use registry::SecurityGroups;
pub use report::DeletionReport;
pub use secgrp::{Reconciled, SecurityGroupCleaner};
