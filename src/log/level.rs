// src/log/level.rs

//! Severity levels of the user-facing installer log.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Totally ordered message severity.
///
/// The derived ordering follows declaration order, which matches the
/// numeric [`weight`](LogLevel::weight) of each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Verbose,
    Info,
    Ok,
    Warning,
    Error,
    Success,
    /// Informational tier that is always shown (hints, "what's next" notes).
    Docs,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Verbose,
        LogLevel::Info,
        LogLevel::Ok,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Success,
        LogLevel::Docs,
    ];

    pub fn weight(self) -> u16 {
        match self {
            LogLevel::Verbose => 0,
            LogLevel::Info => 2,
            LogLevel::Ok => 3,
            LogLevel::Warning => 5,
            LogLevel::Error => 10,
            LogLevel::Success => 99,
            LogLevel::Docs => 999,
        }
    }

    /// Bracketed tag written into the log file.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Verbose => "[VER]",
            LogLevel::Info => "[INFO]",
            LogLevel::Ok => "[OK]",
            LogLevel::Warning => "[WARN]",
            LogLevel::Error => "[ERR]",
            LogLevel::Success => "[SUCCESS]",
            LogLevel::Docs => "[DOCS]",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Ok => "ok",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
            LogLevel::Docs => "docs",
        }
    }

    /// ANSI foreground color used by terminal consumers.
    pub fn ansi_color(self) -> &'static str {
        match self {
            LogLevel::Verbose => "\x1b[90m",
            LogLevel::Info => "\x1b[94m",
            LogLevel::Ok => "\x1b[92m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Success => "\x1b[32m",
            LogLevel::Docs => "\x1b[96m",
        }
    }

    /// Display predicate shared by live display and export.
    pub fn is_visible_at(self, threshold: LogLevel) -> bool {
        self >= threshold
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "ver" => Ok(LogLevel::Verbose),
            "info" => Ok(LogLevel::Info),
            "ok" => Ok(LogLevel::Ok),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" | "err" => Ok(LogLevel::Error),
            "success" => Ok(LogLevel::Success),
            "docs" => Ok(LogLevel::Docs),
            other => Err(format!(
                "invalid log level: {other} (expected verbose, info, ok, warning, error, success or docs)"
            )),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_string_matches_from_str() {
        assert_eq!(LogLevel::try_from("Warning".to_string()), Ok(LogLevel::Warning));
        let err = LogLevel::try_from("loud".to_string()).unwrap_err();
        assert!(err.contains("invalid log level"), "{err}");
    }

    #[test]
    fn ordering_follows_weight() {
        for pair in LogLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].weight() < pair[1].weight());
        }
    }

    #[test]
    fn visibility_is_inclusive() {
        assert!(LogLevel::Warning.is_visible_at(LogLevel::Warning));
        assert!(LogLevel::Error.is_visible_at(LogLevel::Warning));
        assert!(!LogLevel::Info.is_visible_at(LogLevel::Warning));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("err".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
