//! `awsclean security-groups` — list or delete security groups.
//!
//! Creation time and creator come from the audit trail, which only looks back
//! 90 days. Groups older than that show `unknown` as creation time.

use awsclean_core::reconcile::{RETENTION_CEILING, TimeWindow};
use awsclean_core::{CleanError, SecurityGroupCleaner};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use tracing::info;

use super::Context;
use crate::output::{render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum SecurityGroupCommand {
    #[command(
        visible_alias = "ls",
        about = "List security groups",
        long_about = "List every security group of the account with creation time, creator and usage.",
        after_help = "EXAMPLES:\n    # List all groups\n    awsclean security-groups list\n\n    # Only groups without attached network interfaces\n    awsclean secgrp ls --only-unused\n\n    # Emit machine-readable output\n    awsclean secgrp ls --format json"
    )]
    List(ListArgs),

    #[command(
        visible_alias = "del",
        about = "Delete unused security groups",
        long_about = "Delete unused security groups created before now - older-then.\n\nGroups whose creation time the audit trail does not \
                      know are never deleted from the command line.",
        after_help = "EXAMPLES:\n    # Show what would be deleted\n    awsclean secgrp del --dry-run\n\n    # Delete groups older than two weeks\n    awsclean secgrp del -o 2w"
    )]
    Delete(WindowArgs),
}

/// Audit-trail lookup window.
#[derive(Args, Debug, Default, Clone)]
pub struct WindowArgs {
    /// Start of the audit-trail lookup (RFC 3339). Defaults to 90 days ago.
    #[arg(long, value_name = "RFC3339", value_parser = parse_timestamp)]
    pub start_time: Option<DateTime<Utc>>,

    /// End of the audit-trail lookup (RFC 3339). Defaults to now.
    #[arg(long, value_name = "RFC3339", value_parser = parse_timestamp)]
    pub end_time: Option<DateTime<Utc>>,
}

impl WindowArgs {
    /// Window bounded by the flags, falling back to `[now - 90d, now]`.
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::Window`] when the end lies before the start.
    pub fn window(&self, now: DateTime<Utc>) -> Result<TimeWindow, CleanError> {
        let start = self
            .start_time
            .unwrap_or_else(|| TimeWindow::lookback(now, RETENTION_CEILING).start());
        let end = self.end_time.unwrap_or(now);
        Ok(TimeWindow::new(start, end)?)
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// List only groups without attached network interfaces.
    #[arg(long)]
    pub only_unused: bool,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// Cleaner settings for one invocation. Usage is always determined since an
/// age threshold is always set.
fn cleaner(ctx: &Context, only_unused: bool) -> SecurityGroupCleaner {
    SecurityGroupCleaner {
        older_then: Some(ctx.older_then),
        dry_run: ctx.dry_run,
        only_unused,
        page_delay: ctx.config.audit_page_delay(),
        ..SecurityGroupCleaner::default()
    }
}

pub fn run(command: &SecurityGroupCommand, ctx: &Context) -> anyhow::Result<()> {
    let now = Utc::now();
    match command {
        SecurityGroupCommand::List(args) => {
            let window = args.window.window(now)?;
            let backend = ctx.connect()?;
            let reconciled = cleaner(ctx, args.only_unused).collect(&backend, &backend, window, now)?;
            if !reconciled.outcome.stale.is_empty() {
                info!(stale = reconciled.outcome.stale.len(), "audit trail mentions deleted groups");
            }
            render_list(&reconciled.listing(), ctx.output)?;
        }
        SecurityGroupCommand::Delete(args) => {
            let window = args.window(now)?;
            let backend = ctx.connect()?;
            let report = cleaner(ctx, false).delete(&backend, &backend, window, now)?;
            render_item(&report, ctx.output)?;
        }
    }
    Ok(())
}
