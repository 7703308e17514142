//! Ignore patterns for resource names.

use regex::Regex;

/// An ignore pattern that is not a valid regular expression.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid ignore pattern '{pattern}': {source}")]
pub struct PatternError {
    /// The rejected pattern.
    pub pattern: String,
    /// Compiler diagnostic.
    #[source]
    pub source: regex::Error,
}

/// Compiled list of regular expressions; a name is ignored when any matches.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    /// Compile every pattern up front.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first pattern that fails to compile.
    pub fn compile<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| PatternError {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// `true` when any pattern matches somewhere in `name`.
    #[must_use]
    pub fn matches_any(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_matches_nothing() {
        let patterns = IgnorePatterns::compile(Vec::<String>::new()).expect("compile");
        assert!(!patterns.matches_any("anything"));
    }

    #[test]
    fn any_pattern_may_match() {
        let patterns = IgnorePatterns::compile(["^base-", "golden"]).expect("compile");
        assert!(patterns.matches_any("base-ubuntu-22"));
        assert!(patterns.matches_any("team-golden-image"));
        assert!(!patterns.matches_any("ubuntu-base-22"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = IgnorePatterns::compile(["ok", "(unclosed"]).expect_err("invalid regex");
        assert_eq!(err.pattern, "(unclosed");
    }
}
