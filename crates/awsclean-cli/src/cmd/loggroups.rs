//! `awsclean log-groups` — list or delete CloudWatch log groups.

use awsclean_core::cleanup::LogGroupCleaner;
use chrono::Utc;
use clap::{Args, Subcommand};

use super::Context;
use crate::output::{render_item, render_list};

#[derive(Subcommand, Debug)]
pub enum LogGroupCommand {
    #[command(
        visible_alias = "ls",
        about = "List old log groups",
        long_about = "List log groups created before now - older-then, minus those matching an ignore pattern of the config file.",
        after_help = "EXAMPLES:\n    # Log groups older than 30 days\n    awsclean log-groups ls -o 30d"
    )]
    List,

    #[command(
        visible_alias = "del",
        about = "Delete old log groups",
        long_about = "Delete log groups created before now - older-then. In dry-run mode nothing is sent to the API.",
        after_help = "EXAMPLES:\n    # Keep lambda logs\n    awsclean loggrps del --ignore '^/aws/lambda/'"
    )]
    Delete(LogGroupDeleteArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct LogGroupDeleteArgs {
    /// Regex of log group names to keep; may be repeated.
    #[arg(long = "ignore", value_name = "REGEX")]
    pub ignore: Vec<String>,
}

pub fn run(command: &LogGroupCommand, ctx: &Context) -> anyhow::Result<()> {
    let extra = match command {
        LogGroupCommand::List => &[][..],
        LogGroupCommand::Delete(args) => args.ignore.as_slice(),
    };
    let cleaner = LogGroupCleaner {
        older_then: ctx.older_then,
        dry_run: ctx.dry_run,
        ignore: ctx.ignore_patterns(extra)?,
    };
    let backend = ctx.connect()?;
    let now = Utc::now();

    match command {
        LogGroupCommand::List => render_list(&cleaner.collect(&backend, now)?.candidates, ctx.output)?,
        LogGroupCommand::Delete(_) => render_item(&cleaner.delete(&backend, now)?, ctx.output)?,
    }
    Ok(())
}
