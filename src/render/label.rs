use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::blame::AnnotationRecord;
use crate::config::LabelConfig;

/// Padding character; editors collapse ordinary spaces in decorations.
const NO_BREAK_SPACE: char = '\u{a0}';
const ELLIPSIS: &str = "...";
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Inline label for a line: short hash, author date and author email, each
/// padded to a fixed width so labels line up.
///
/// Uncommitted records get the blank label.
pub fn line_label(record: &AnnotationRecord, cfg: &LabelConfig) -> String {
    if !record.is_committed() {
        return empty_label(cfg);
    }
    let author = record.author();
    format!(
        "{} {} {}",
        fill_and_truncate(&record.revision_id, cfg.hash_width, ""),
        format_date(author.timestamp, &author.timezone, &cfg.date_format),
        fill_and_truncate(&author.email, cfg.email_width, ELLIPSIS),
    )
}

/// Blank label as wide as the widest `line_label`.
pub fn empty_label(cfg: &LabelConfig) -> String {
    let date_width = format_date(0, "+0000", &cfg.date_format).chars().count();
    let width = cfg.hash_width + 1 + date_width + 1 + cfg.email_width + ELLIPSIS.len();
    std::iter::repeat(NO_BREAK_SPACE).take(width).collect()
}

/// Status bar text for the line under the cursor.
pub fn status_text(line: usize, record: &AnnotationRecord) -> Option<String> {
    record
        .is_committed()
        .then(|| format!("Blame line {line} {}", record.author().name))
}

/// Format an epoch timestamp in the committer's own offset (`+0200`).
/// Falls back to UTC for an unparsable offset and to ISO dates for an
/// invalid format string.
pub fn format_date(timestamp: i64, timezone: &str, format: &str) -> String {
    let Some(utc) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return String::new();
    };
    let local = utc.with_timezone(&parse_offset(timezone).unwrap_or_else(|| Utc.fix()));

    let mut out = String::new();
    if write!(out, "{}", local.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", local.format(FALLBACK_DATE_FORMAT));
    }
    out
}

/// Parse git's `+HHMM` / `-HHMM` timezone notation.
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Pad `s` to `width` characters, or cut it to `width` and append `extra`.
fn fill_and_truncate(s: &str, width: usize, extra: &str) -> String {
    let len = s.chars().count();
    if len > width {
        let mut out: String = s.chars().take(width).collect();
        out.push_str(extra);
        out
    } else {
        let mut out = s.to_string();
        out.extend(std::iter::repeat(NO_BREAK_SPACE).take(width - len));
        out
    }
}
