//! Command handlers, one module per resource kind.

pub mod ami;
pub mod completions;
pub mod ebs;
pub mod loggroups;
pub mod secgrp;

use std::time::Duration;

use awsclean_core::CleanError;
use awsclean_core::config::UserConfig;
use awsclean_core::pattern::IgnorePatterns;

use crate::aws::AwsBackend;
use crate::output::OutputMode;

/// Settings shared by every cleanup command, resolved from flags and the
/// user config.
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputMode,
    pub dry_run: bool,
    pub older_then: Duration,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub config: UserConfig,
}

impl Context {
    /// Connect to AWS with the resolved region and profile.
    pub fn connect(&self) -> anyhow::Result<AwsBackend> {
        AwsBackend::connect(self.region.clone(), self.profile.clone())
    }

    /// Ignore patterns of the config file followed by those given on the
    /// command line.
    pub fn ignore_patterns(&self, extra: &[String]) -> Result<IgnorePatterns, CleanError> {
        Ok(IgnorePatterns::compile(self.config.ignore.iter().chain(extra))?)
    }
}
