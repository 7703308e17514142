//! `awsclean amis` — list or deregister machine images owned by the account.

use awsclean_core::cleanup::AmiCleaner;
use awsclean_core::pattern::IgnorePatterns;
use chrono::Utc;
use clap::{Args, Subcommand};

use super::Context;
use crate::output::{render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum AmiCommand {
    #[command(
        visible_alias = "ls",
        about = "List machine images",
        long_about = "List images owned by this account (and --account), unused ones first.",
        after_help = "EXAMPLES:\n    # Images not referenced by any instance\n    awsclean amis list --only-unused\n\n    # Count launch templates as users too\n    awsclean ami ls --launch-templates"
    )]
    List(AmiListArgs),

    #[command(
        visible_alias = "del",
        about = "Deregister unused machine images",
        long_about = "Deregister unused images created before now - older-then. Images whose name matches an --ignore pattern are kept.",
        after_help = "EXAMPLES:\n    # Show what would be deregistered\n    awsclean ami del --dry-run\n\n    # Keep golden images\n    awsclean ami del --ignore '^golden-'"
    )]
    Delete(AmiDeleteArgs),
}

/// Which images count as owned and used.
#[derive(Args, Debug, Default, Clone)]
pub struct ImageSource {
    /// Additional owner account id besides the caller's own.
    #[arg(long, value_name = "ACCOUNT_ID")]
    pub account: Option<String>,

    /// Treat images referenced by `$Latest` launch template versions as used.
    #[arg(long)]
    pub launch_templates: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct AmiListArgs {
    #[command(flatten)]
    pub source: ImageSource,

    /// List only images no instance or launch template references.
    #[arg(long)]
    pub only_unused: bool,
}

#[derive(Args, Debug, Default, Clone)]
pub struct AmiDeleteArgs {
    #[command(flatten)]
    pub source: ImageSource,

    /// Regex of image names to keep; may be repeated.
    #[arg(long = "ignore", value_name = "REGEX")]
    pub ignore: Vec<String>,
}

fn cleaner(ctx: &Context, source: &ImageSource, only_unused: bool, ignore: IgnorePatterns) -> AmiCleaner {
    AmiCleaner {
        older_then: ctx.older_then,
        account: source.account.clone(),
        dry_run: ctx.dry_run,
        only_unused,
        launch_templates: source.launch_templates,
        ignore,
    }
}

pub fn run(command: &AmiCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        AmiCommand::List(args) => {
            let cleaner = cleaner(ctx, &args.source, args.only_unused, IgnorePatterns::default());
            let backend = ctx.connect()?;
            let inventory = cleaner.collect(&backend)?;
            render_list(&inventory.listing(), ctx.output)?;
        }
        AmiCommand::Delete(args) => {
            let ignore = ctx.ignore_patterns(&args.ignore)?;
            let cleaner = cleaner(ctx, &args.source, true, ignore);
            let backend = ctx.connect()?;
            let report = cleaner.delete(&backend, Utc::now())?;
            render_item(&report, ctx.output)?;
        }
    }
    Ok(())
}
