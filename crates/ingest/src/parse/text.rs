//! Line handling shared by the parsers.

use std::collections::VecDeque;

/// Field key for a label: lowercase, `:` and `-` removed, whitespace runs
/// collapsed to `_`.
///
/// `"Space Weather Message Code: "` → `space_weather_message_code`,
/// `"X-ray Class: "` → `xray_class`.
pub fn clean_key(label: &str) -> String {
    label
        .to_lowercase()
        .replace([':', '-'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Trim a line and collapse internal whitespace runs to single spaces.
pub fn clean_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `prefix` in `table` that `line` starts with, plus the trimmed remainder.
///
/// Table order is significant.
pub fn match_prefix<'a, 'l>(line: &'l str, table: &[&'a str]) -> Option<(&'a str, &'l str)> {
    table
        .iter()
        .find_map(|prefix| line.strip_prefix(*prefix).map(|rest| (*prefix, rest.trim())))
}

/// Forward-only cursor over the non-blank lines of a product.
///
/// Handlers that need the following lines peek with [`lookahead`](Self::lookahead)
/// and commit with [`consume`](Self::consume); consumed lines are never
/// yielded again.
const ALERT_LINE_END: &str = "\r\n";

#[derive(Debug, Clone, Default)]
pub struct LineCursor {
    lines: VecDeque<String>,
}

impl LineCursor {
    pub fn new(lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            lines: lines.into_iter().filter(|l| !l.is_empty()).collect(),
        }
    }

    /// Alert bulletins: each line trimmed, inner spacing kept.
    ///
    /// Bulletins are CRLF-delimited, so a stray LF stays inside its line.
    /// Bodies with no CRLF at all (hand-saved replay files) split on LF.
    pub fn for_alert(body: &str) -> Self {
        let trimmed = |l: &str| l.trim().to_string();
        if body.contains(ALERT_LINE_END) {
            Self::new(body.split(ALERT_LINE_END).map(trimmed))
        } else {
            Self::new(body.lines().map(trimmed))
        }
    }

    /// Report tables: each line trimmed with whitespace runs collapsed.
    pub fn for_report(body: &str) -> Self {
        Self::new(body.lines().map(clean_line))
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// The line `n` positions past the current one (0 = the next line).
    pub fn lookahead(&self, n: usize) -> Option<&str> {
        self.lines.get(n).map(String::as_str)
    }

    /// Drop the next `n` lines. Returns how many were actually dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.lines.len());
        self.lines.drain(..n);
        n
    }

    /// The line right after the first one starting with `marker`.
    pub fn line_after(&self, marker: &str) -> Option<&str> {
        let idx = self.lines.iter().position(|l| l.starts_with(marker))?;
        self.lookahead(idx + 1)
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_key_variants() {
        assert_eq!(clean_key("Space Weather Message Code: "), "space_weather_message_code");
        assert_eq!(clean_key("Aurora - "), "aurora");
        assert_eq!(clean_key("X-ray Class: "), "xray_class");
        assert_eq!(clean_key("CANCEL WARNING: "), "cancel_warning");
        assert_eq!(clean_key("Highest Storm Level Predicted by Day:"), "highest_storm_level_predicted_by_day");
        assert_eq!(clean_key(":Issued: "), "issued");
    }

    #[test]
    fn clean_line_collapses_runs() {
        assert_eq!(clean_line("  00-03UT        3.67      2.67 \r"), "00-03UT 3.67 2.67");
        assert_eq!(clean_line("\t \r"), "");
    }

    #[test]
    fn first_prefix_wins() {
        let table = ["Issue Time: ", "Issue "];
        assert_eq!(
            match_prefix("Issue Time: 2023 Apr 24 1755 UTC", &table),
            Some(("Issue Time: ", "2023 Apr 24 1755 UTC"))
        );
        assert_eq!(match_prefix("Issue nothing", &table), Some(("Issue ", "nothing")));
        assert_eq!(match_prefix("Other", &table), None);
    }

    #[test]
    fn cursor_skips_blank_lines_and_commits() {
        let mut cursor = LineCursor::for_alert("first\r\n\r\n  second  \r\nthird\r\nfourth\r\n");
        assert_eq!(cursor.remaining(), 4);
        assert_eq!(cursor.next_line().as_deref(), Some("first"));
        assert_eq!(cursor.lookahead(0), Some("second"));
        assert_eq!(cursor.lookahead(1), Some("third"));
        assert_eq!(cursor.consume(2), 2);
        assert_eq!(cursor.next_line().as_deref(), Some("fourth"));
        assert!(cursor.is_empty());
        assert_eq!(cursor.consume(5), 0);
    }

    #[test]
    fn alert_lines_end_at_crlf_only() {
        let mut cursor = LineCursor::for_alert("Comment: first half\nsecond half\r\nAurora - visible\r\n");
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.next_line().as_deref(), Some("Comment: first half\nsecond half"));
        assert_eq!(cursor.next_line().as_deref(), Some("Aurora - visible"));

        let lf_only = LineCursor::for_alert("Serial Number: 7\nAurora - visible\n");
        assert_eq!(lf_only.lookahead(1), Some("Aurora - visible"));
    }

    #[test]
    fn line_after_marker() {
        let cursor = LineCursor::for_report("NOAA Kp index forecast 01 May - 03 May\n   May 01    May 02    May 03\n");
        assert_eq!(cursor.line_after("NOAA Kp index forecast"), Some("May 01 May 02 May 03"));
        assert_eq!(cursor.line_after("NOAA Ap Index Forecast"), None);
    }
}
