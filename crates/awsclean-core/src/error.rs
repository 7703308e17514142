use std::fmt;

use crate::api::ApiError;
use crate::collect::UsageError;
use crate::config::ConfigError;
use crate::merge::MergeError;
use crate::pattern::PatternError;
use crate::reconcile::InvalidWindow;
use crate::registry::RegistryError;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidDuration,
    InvalidPattern,
    InvalidTimeWindow,
    KeyCollision,
    InvalidRecord,
    UsageIncomplete,
    InvalidCreationDate,
    ListingFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidDuration => "E1002",
            Self::InvalidPattern => "E1003",
            Self::InvalidTimeWindow => "E1004",
            Self::KeyCollision => "E2001",
            Self::InvalidRecord => "E2002",
            Self::UsageIncomplete => "E2003",
            Self::InvalidCreationDate => "E2004",
            Self::ListingFailed => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidDuration => "Invalid duration",
            Self::InvalidPattern => "Invalid ignore pattern",
            Self::InvalidTimeWindow => "Invalid time window",
            Self::KeyCollision => "Security group key collision",
            Self::InvalidRecord => "Invalid security group record",
            Self::UsageIncomplete => "Security group usage could not be determined",
            Self::InvalidCreationDate => "Unparsable creation date",
            Self::ListingFailed => "Cloud resource listing failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in awsclean/config.toml and retry."),
            Self::InvalidDuration => Some("Use a duration such as 7d, 36h or 1w2d."),
            Self::InvalidPattern => Some("Ignore patterns are regular expressions; check escaping."),
            Self::InvalidTimeWindow => Some("--end-time must not be before --start-time."),
            Self::KeyCollision | Self::InvalidRecord => None,
            Self::UsageIncomplete => {
                Some("Retry later; DescribeNetworkInterfaces may have been throttled.")
            }
            Self::InvalidCreationDate => Some("Report the resource id; the API returned an unexpected format."),
            Self::ListingFailed => Some("Check credentials, region and IAM permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fatal error of a cleanup run.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Listing security groups failed.
    #[error("could not list security groups: {0}")]
    Inventory(#[source] ApiError),

    /// An attachment lookup failed.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Listing images failed.
    #[error("could not describe images: {0}")]
    Images(#[source] ApiError),

    /// Listing log groups failed.
    #[error("could not list log groups: {0}")]
    LogGroups(#[source] ApiError),

    /// A resource carried a creation date in an unexpected format.
    #[error("invalid creation date '{value}' of {resource}: {source}")]
    CreationDate {
        resource: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Window(#[from] InvalidWindow),

    /// The runtime driving cloud calls could not be started.
    #[error("could not start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CleanError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Inventory(_) | Self::Images(_) | Self::LogGroups(_) => ErrorCode::ListingFailed,
            Self::Usage(_) => ErrorCode::UsageIncomplete,
            Self::CreationDate { .. } => ErrorCode::InvalidCreationDate,
            Self::Pattern(_) => ErrorCode::InvalidPattern,
            Self::Window(_) => ErrorCode::InvalidTimeWindow,
            Self::Runtime(_) => ErrorCode::InternalUnexpected,
        }
    }
}

impl MergeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::KeyCollision { .. } => ErrorCode::KeyCollision,
        }
    }
}

impl RegistryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyName | Self::MissingDescriptor(_) => ErrorCode::InvalidRecord,
            Self::Merge(err) => err.code(),
        }
    }
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Duration { .. } => ErrorCode::InvalidDuration,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}
