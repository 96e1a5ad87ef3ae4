//! UI utilities for Timescape CLI.

use std::time::Duration;

use chrono::{DateTime, Utc};

use timescape_core::notes::NoteRecord;

const TABLE_WIDTH: usize = 72;

/// Parse a duration string like "500ms", "5s", "2m" or "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_millis(num))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let num: u64 = num_str.parse().ok()?;
        num.checked_mul(60).map(Duration::from_secs)
    } else if let Some(num_str) = s.strip_suffix('s') {
        let num: u64 = num_str.parse().ok()?;
        Some(Duration::from_secs(num))
    } else if let Some(num_str) = s.strip_suffix('h') {
        let num: u64 = num_str.parse().ok()?;
        num.checked_mul(3600).map(Duration::from_secs)
    } else {
        None
    }
}

/// Format a duration the way it is written in the config file.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Format an export timestamp (milliseconds since the epoch).
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || "unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Truncate a string to fit within a maximum width.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

/// Horizontal rule for tables.
pub fn rule() -> String {
    "─".repeat(TABLE_WIDTH)
}

/// Display notes as a text table.
pub fn print_notes(notes: &[NoteRecord]) {
    println!("{}", rule());
    println!(
        "  {:4}  {:14}  {:20}  {:9}  {:16}",
        "ID", "Flow", "Card", "Colour", "Front"
    );
    println!("{}", rule());

    if notes.is_empty() {
        println!("  (no notes)");
        println!("{}", rule());
        return;
    }

    for note in notes {
        println!(
            "  {:4}  {:14}  {:20}  #{:08X}  {:16}",
            note.id,
            truncate_string(&note.flow_name, 14),
            truncate_string(&note.card_title, 20),
            note.argb(),
            truncate_string(note.front.text.lines().next().unwrap_or_default(), 16),
        );
    }

    println!("{}", rule());
}
