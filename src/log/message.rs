// src/log/message.rs

use time::OffsetDateTime;
use time::macros::format_description;

use super::LogLevel;

/// One immutable entry of the installer log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// Position in write order, unique per `LogService`.
    pub seq: u64,
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    /// Origin of the message, e.g. a task identity key or `runner`.
    pub tag: String,
    pub text: String,
}

impl LogMessage {
    /// Render the message as a single sink line:
    /// `[HH:MM:SS] [LEVEL] [tag] text`.
    ///
    /// Embedded line breaks are escaped so one message is always one line.
    pub fn format_line(&self) -> String {
        let clock = self
            .timestamp
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_else(|_| "--:--:--".to_string());

        let text = escape_line_breaks(&self.text);
        if self.tag.is_empty() {
            format!("[{clock}] {} {text}", self.level.tag())
        } else {
            format!("[{clock}] {} [{}] {text}", self.level.tag(), self.tag)
        }
    }

    pub fn is_visible_at(&self, threshold: LogLevel) -> bool {
        self.level.is_visible_at(threshold)
    }
}

fn escape_line_breaks(text: &str) -> String {
    let trimmed = text.trim_end_matches(['\r', '\n']);
    if !trimmed.contains(['\r', '\n']) {
        return trimmed.to_string();
    }
    trimmed.replace("\r\n", "\\n").replace(['\r', '\n'], "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn message(tag: &str, text: &str) -> LogMessage {
        LogMessage {
            seq: 0,
            timestamp: datetime!(2025-03-01 09:05:07 UTC),
            level: LogLevel::Warning,
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn formats_clock_level_and_tag() {
        assert_eq!(
            message("python", "disk almost full").format_line(),
            "[09:05:07] [WARN] [python] disk almost full"
        );
    }

    #[test]
    fn omits_empty_tag() {
        assert_eq!(message("", "plain").format_line(), "[09:05:07] [WARN] plain");
    }

    #[test]
    fn keeps_multiline_text_on_one_line() {
        let line = message("runner", "first\r\nsecond\nthird\n").format_line();
        assert_eq!(line, "[09:05:07] [WARN] [runner] first\\nsecond\\nthird");
        assert!(!line.contains('\n'));
    }
}
