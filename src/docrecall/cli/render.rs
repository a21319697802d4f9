//! # Rendering
//!
//! Turns API results into terminal text. Layout (widths, truncation, time
//! formatting) is computed here; functions return strings so they can be
//! tested without a terminal. Only [`print_messages`] writes.

use chrono::{DateTime, Utc};
use colored::*;
use docrecall::commands::{CmdMessage, MessageLevel};
use docrecall::config::{RecallConfig, KEYS};
use docrecall::model::{HotCloseState, SessionKey, Snapshot};
use docrecall::store::TableUsage;
use unicode_width::UnicodeWidthStr;

pub const LINE_WIDTH: usize = 100;
pub const TIME_WIDTH: usize = 16;
const STAMP_WIDTH: usize = 15;

pub fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => eprintln!("{}", message.content.red()),
        }
    }
}

pub fn render_hot_close(session: &SessionKey, state: &HotCloseState) -> String {
    if state.is_empty() {
        return format!("Nothing to restore for {}.\n", session);
    }

    let mut out = format!("{}\n", session.to_string().bold());
    if let Some(cursor) = state.cursor {
        out.push_str(&format!("  cursor   {}:{}\n", cursor.line, cursor.ch));
    }
    if let Some(scroll) = state.scroll {
        out.push_str(&format!("  scroll   {}, {}\n", scroll.x, scroll.y));
    }
    if let Some(history) = &state.history {
        let compact = history.to_string();
        out.push_str(&format!("  history  {}\n", preview(&compact, LINE_WIDTH - 11).trim_end()));
    }
    if let Some(text) = &state.text {
        out.push_str("--------------------------------\n");
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// One line per snapshot: timestamp, preview, age.
pub fn render_history(session: &SessionKey, snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return format!("No local history for {}.\n", session);
    }

    let columns = LINE_WIDTH.saturating_sub(STAMP_WIDTH + TIME_WIDTH + 2);
    let mut out = String::new();
    for snap in snapshots {
        out.push_str(&format!(
            "{} {} {}\n",
            format!("{:<width$}", snap.timestamp, width = STAMP_WIDTH).yellow(),
            preview(&snap.text, columns),
            format_time_ago(snap.timestamp).dimmed()
        ));
    }
    out
}

pub fn render_usage(usage: &[TableUsage]) -> String {
    let mut out = String::new();
    for u in usage {
        let percent = if u.capacity == 0 {
            100.0
        } else {
            u.bytes as f64 * 100.0 / u.capacity as f64
        };
        out.push_str(&format!(
            "{:<22} {:>7} rows {:>12} / {:>12} bytes ({:.1}%)\n",
            u.table.name(),
            u.rows,
            u.bytes,
            u.capacity,
            percent
        ));
    }
    out
}

pub fn render_config(config: &RecallConfig) -> String {
    KEYS.iter()
        .filter_map(|k| config.get(k).map(|v| format!("{} = {}\n", k, v)))
        .collect()
}

/// `text` on one line, exactly `columns` wide. Whitespace runs become a single
/// space; text that does not fit is cut and ends in `…`.
fn preview(text: &str, columns: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let width = flat.width();
    if width <= columns {
        return format!("{}{}", flat, " ".repeat(columns - width));
    }
    if columns == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w >= columns {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out.push_str(&" ".repeat(columns - used - 1));
    out
}

fn format_time_ago(timestamp_ms: i64) -> String {
    let Some(then) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        return format!("{:>width$}", "", width = TIME_WIDTH);
    };
    let duration = Utc::now().signed_duration_since(then);

    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());

    format!("{:>width$}", time_str, width = TIME_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrecall::model::{CursorPos, Table};

    #[test]
    fn empty_hot_close_says_nothing_to_restore() {
        let out = render_hot_close(&"/a.js".into(), &HotCloseState::default());
        assert!(out.contains("Nothing to restore"));
    }

    #[test]
    fn hot_close_shows_cursor_and_text() {
        let state = HotCloseState {
            cursor: Some(CursorPos::new(4, 2)),
            text: Some("let a;".into()),
            ..Default::default()
        };
        let out = render_hot_close(&"/a.js".into(), &state);
        assert!(out.contains("4:2"));
        assert!(out.ends_with("let a;\n"));
    }

    #[test]
    fn history_lines_fit_and_flatten_newlines() {
        let snaps = vec![Snapshot {
            timestamp: 200,
            text: "first line\nsecond line ".repeat(20),
        }];
        let out = render_history(&"/a.js".into(), &snaps);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("200"));
        assert!(out.contains('…'));
    }

    #[test]
    fn preview_cuts_wide_chars_to_the_column() {
        let out = preview("日本語のテキスト", 7);
        assert_eq!(out.width(), 7);
        assert_eq!(out, "日本語…");
    }

    #[test]
    fn preview_pads_short_text_and_collapses_whitespace() {
        let out = preview("a\n\n  b\tc", 8);
        assert_eq!(out, "a b c   ");
    }

    #[test]
    fn usage_lists_each_table() {
        let usage = vec![TableUsage {
            table: Table::LocalHistory,
            rows: 3,
            bytes: 50,
            capacity: 100,
        }];
        let out = render_usage(&usage);
        assert!(out.contains("local_history_doctxt"));
        assert!(out.contains("50.0%"));
    }

    #[test]
    fn config_lists_every_key() {
        let out = render_config(&RecallConfig::default());
        assert_eq!(out.lines().count(), KEYS.len());
        assert!(out.contains("debounce_ms = 1250"));
    }
}
