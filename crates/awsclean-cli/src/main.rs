#![forbid(unsafe_code)]

mod aws;
mod cmd;
mod output;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use awsclean_core::config::{UserConfig, load_config_from, load_user_config};
use awsclean_core::duration::{DEFAULT_OLDER_THEN, format_duration, parse_duration};
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "awsclean: find and delete unused AWS resources",
    long_about = "Find and delete unused AWS resources: security groups, machine images, EBS volumes and \
                  CloudWatch log groups.\n\nCredentials and region come from the usual AWS sources \
                  (environment, ~/.aws/config, ~/.aws/credentials)."
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only report what would be deleted; delete calls are sent as dry runs.
    #[arg(short, long, global = true)]
    dry_run: bool,

    /// Only delete resources older than this (e.g. 7d, 36h, 1w2d). Default: 7d.
    #[arg(short, long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    older_then: Option<Duration>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (same as --format json).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// AWS region, overriding the configured one.
    #[arg(long, global = true)]
    region: Option<String>,

    /// Named AWS profile.
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Config file (default: <config dir>/awsclean/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        visible_alias = "secgrp",
        next_help_heading = "Resources",
        about = "List or delete security groups",
        after_help = "EXAMPLES:\n    awsclean security-groups list\n    awsclean secgrp ls --only-unused\n    awsclean secgrp del --dry-run"
    )]
    SecurityGroups {
        #[command(subcommand)]
        command: cmd::secgrp::SecurityGroupCommand,
    },

    #[command(
        visible_alias = "ami",
        next_help_heading = "Resources",
        about = "List or deregister machine images",
        after_help = "EXAMPLES:\n    awsclean amis list\n    awsclean ami del --ignore '^golden-'"
    )]
    Amis {
        #[command(subcommand)]
        command: cmd::ami::AmiCommand,
    },

    #[command(next_help_heading = "Resources", about = "List or delete EBS volumes")]
    Ebs {
        #[command(subcommand)]
        command: cmd::ebs::EbsCommand,
    },

    #[command(
        visible_alias = "loggrps",
        next_help_heading = "Resources",
        about = "List or delete CloudWatch log groups"
    )]
    LogGroups {
        #[command(subcommand)]
        command: cmd::loggroups::LogGroupCommand,
    },

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    awsclean completions bash\n\n    # Generate zsh completions\n    awsclean completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<UserConfig> {
        let config = match &self.config {
            Some(path) => load_config_from(path)?,
            None => load_user_config()?,
        };
        Ok(config)
    }

    /// Resolve flags against the user config. Updates `mode` as soon as the
    /// config-dependent output mode is known.
    fn context(&self, mode: &mut OutputMode) -> anyhow::Result<cmd::Context> {
        let config = self.load_config()?;
        *mode = output::resolve_output_mode(self.format, self.json, config.output.as_deref());

        let older_then = match self.older_then {
            Some(older_then) => older_then,
            None => match config.older_then()? {
                Some(older_then) => older_then,
                None => parse_duration(DEFAULT_OLDER_THEN).context("built-in default duration")?,
            },
        };
        debug!(older_then = %format_duration(older_then), dry_run = self.dry_run, "resolved settings");

        Ok(cmd::Context {
            output: *mode,
            dry_run: self.dry_run,
            older_then,
            region: self.region.clone().or_else(|| config.region.clone()),
            profile: self.profile.clone().or_else(|| config.profile.clone()),
            config,
        })
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("AWSCLEAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "awsclean=debug,info"
        } else {
            "awsclean=info,warn"
        })
    });

    let format = env::var("AWSCLEAN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, mode: &mut OutputMode) -> anyhow::Result<()> {
    match &cli.command {
        Commands::SecurityGroups { command } => cmd::secgrp::run(command, &cli.context(mode)?),
        Commands::Amis { command } => cmd::ami::run(command, &cli.context(mode)?),
        Commands::Ebs { command } => cmd::ebs::run(command, &cli.context(mode)?),
        Commands::LogGroups { command } => cmd::loggroups::run(command, &cli.context(mode)?),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut mode = output::resolve_output_mode(cli.format, cli.json, None);
    match run(&cli, &mut mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(render_err) = output::render_error(mode, &CliError::from_anyhow(&err)) {
                eprintln!("error: {err:#} (rendering failed: {render_err})");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmd::ami::AmiCommand;
    use cmd::ebs::EbsCommand;
    use cmd::loggroups::LogGroupCommand;
    use cmd::secgrp::SecurityGroupCommand;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|err| panic!("failed to parse {args:?}: {err}"))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommand() {
        let before = parse(&["awsclean", "-d", "-o", "2w", "ebs", "ls"]);
        let after = parse(&["awsclean", "ebs", "ls", "--dry-run", "--older-then", "14d"]);
        for cli in [before, after] {
            assert!(cli.dry_run);
            assert_eq!(cli.older_then, Some(Duration::from_secs(14 * 24 * 60 * 60)));
        }
    }

    #[test]
    fn older_then_is_optional() {
        let cli = parse(&["awsclean", "log-groups", "list"]);
        assert!(cli.older_then.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn invalid_older_then_is_rejected() {
        assert!(Cli::try_parse_from(["awsclean", "-o", "soon", "ebs", "ls"]).is_err());
    }

    #[test]
    fn aliases_resolve_to_commands() {
        let cli = parse(&["awsclean", "secgrp", "ls", "--only-unused"]);
        assert!(matches!(
            cli.command,
            Commands::SecurityGroups {
                command: SecurityGroupCommand::List(ref args)
            } if args.only_unused
        ));

        let cli = parse(&["awsclean", "ami", "del", "--ignore", "^golden-", "--ignore", "-keep$"]);
        assert!(matches!(
            cli.command,
            Commands::Amis {
                command: AmiCommand::Delete(ref args)
            } if args.ignore.len() == 2
        ));

        let cli = parse(&["awsclean", "loggrps", "del"]);
        assert!(matches!(
            cli.command,
            Commands::LogGroups {
                command: LogGroupCommand::Delete(_)
            }
        ));

        let cli = parse(&["awsclean", "ebs", "del"]);
        assert!(matches!(cli.command, Commands::Ebs { command: EbsCommand::Delete }));
    }

    #[test]
    fn time_window_flags_parse_rfc3339() {
        let cli = parse(&[
            "awsclean",
            "security-groups",
            "delete",
            "--start-time",
            "2024-01-01T00:00:00Z",
            "--end-time",
            "2024-02-01T00:00:00+01:00",
        ]);
        let Commands::SecurityGroups {
            command: SecurityGroupCommand::Delete(window),
        } = cli.command
        else {
            panic!("expected security-groups delete");
        };
        assert!(window.start_time.is_some());
        assert!(window.end_time.is_some());

        assert!(Cli::try_parse_from(["awsclean", "secgrp", "ls", "--start-time", "yesterday"]).is_err());
    }

    #[test]
    fn format_and_hidden_json_flag() {
        let cli = parse(&["awsclean", "--format", "json", "ebs", "ls"]);
        assert_eq!(cli.format, Some(OutputMode::Json));

        let cli = parse(&["awsclean", "ebs", "ls", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn ami_source_flags_parse() {
        let cli = parse(&["awsclean", "amis", "list", "--account", "123456789012", "--launch-templates"]);
        let Commands::Amis {
            command: AmiCommand::List(args),
        } = cli.command
        else {
            panic!("expected amis list");
        };
        assert_eq!(args.source.account.as_deref(), Some("123456789012"));
        assert!(args.source.launch_templates);
        assert!(!args.only_unused);
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = parse(&["awsclean", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn context_prefers_flags_over_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "older_then = \"30d\"\nregion = \"eu-west-1\"\nprofile = \"ops\"\noutput = \"json\"\n")
            .expect("write config");
        let path = path.to_string_lossy().into_owned();

        let mut mode = OutputMode::Text;
        let cli = parse(&["awsclean", "--config", path.as_str(), "--region", "us-east-1", "ebs", "ls"]);
        let ctx = cli.context(&mut mode).expect("context");
        assert_eq!(ctx.older_then, Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(ctx.region.as_deref(), Some("us-east-1"));
        assert_eq!(ctx.profile.as_deref(), Some("ops"));

        let cli = parse(&["awsclean", "--config", path.as_str(), "-o", "1d", "--format", "text", "ebs", "ls"]);
        let ctx = cli.context(&mut mode).expect("context");
        assert_eq!(ctx.older_then, Duration::from_secs(24 * 60 * 60));
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn missing_explicit_config_fails() {
        let mut mode = OutputMode::Text;
        let cli = parse(&["awsclean", "--config", "/nonexistent/awsclean.toml", "ebs", "ls"]);
        let err = cli.context(&mut mode).expect_err("missing config");
        assert_eq!(CliError::from_anyhow(&err).error_code.as_deref(), Some("E1001"));
    }
}
