//! Built-in resolver strategies.

use super::TokenResolver;
use crate::utils::{now_utc, Timestamp};
use std::collections::BTreeMap;

/// A fixed table of token values.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    values: BTreeMap<String, String>,
}

impl StaticTokens {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    #[must_use]
    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(token.into(), value.into());
        self
    }
}

impl TokenResolver for StaticTokens {
    fn resolve(&self, token: &str) -> Option<String> {
        self.values.get(token).cloned()
    }

    fn tokens(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Date and time tokens: `$DATE`, `$TIME`, `$YEAR`, `$MONTH`, `$DAY`.
#[derive(Debug, Clone, Default)]
pub struct DateTimeTokens {
    fixed: Option<Timestamp>,
}

impl DateTimeTokens {
    const TOKENS: [&'static str; 5] = ["DATE", "TIME", "YEAR", "MONTH", "DAY"];

    /// Resolves against the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves against a fixed instant.
    #[must_use]
    pub fn at(instant: Timestamp) -> Self {
        Self {
            fixed: Some(instant),
        }
    }
}

impl TokenResolver for DateTimeTokens {
    fn resolve(&self, token: &str) -> Option<String> {
        let now = self.fixed.unwrap_or_else(now_utc);
        let format = match token {
            "DATE" => "%Y-%m-%d",
            "TIME" => "%H-%M-%S",
            "YEAR" => "%Y",
            "MONTH" => "%m",
            "DAY" => "%d",
            _ => return None,
        };
        Some(now.format(format).to_string())
    }

    fn tokens(&self) -> Vec<String> {
        Self::TOKENS.iter().map(ToString::to_string).collect()
    }
}
