//! `awsclean ebs` — list or delete EBS volumes.

use awsclean_core::cleanup::EbsCleaner;
use chrono::Utc;
use clap::{Args, Subcommand};

use super::Context;
use crate::output::{render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum EbsCommand {
    #[command(
        visible_alias = "ls",
        about = "List EBS volumes",
        after_help = "EXAMPLES:\n    # Volumes not attached to any instance\n    awsclean ebs ls --only-unused"
    )]
    List(EbsListArgs),

    #[command(
        visible_alias = "del",
        about = "Delete unattached EBS volumes",
        long_about = "Delete volumes that are not in-use and were created before now - older-then.",
        after_help = "EXAMPLES:\n    # Show what would be deleted\n    awsclean ebs del --dry-run -o 30d"
    )]
    Delete,
}

#[derive(Args, Debug, Default, Clone)]
pub struct EbsListArgs {
    /// List only volumes that are not in-use.
    #[arg(long)]
    pub only_unused: bool,
}

pub fn run(command: &EbsCommand, ctx: &Context) -> anyhow::Result<()> {
    let only_unused = match command {
        EbsCommand::List(args) => args.only_unused,
        EbsCommand::Delete => true,
    };
    let cleaner = EbsCleaner {
        older_then: ctx.older_then,
        dry_run: ctx.dry_run,
        only_unused,
    };
    let backend = ctx.connect()?;

    match command {
        EbsCommand::List(_) => render_list(&cleaner.collect(&backend).listing(), ctx.output)?,
        EbsCommand::Delete => render_item(&cleaner.delete(&backend, Utc::now()), ctx.output)?,
    }
    Ok(())
}
