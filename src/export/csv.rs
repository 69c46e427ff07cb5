//! Export message history to delimited text.
//!
//! Message text is always quoted and flattened to one line; the other cells
//! are quoted only when they would break the row.

use chrono::{NaiveDate, SecondsFormat};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::db::MessageRecord;
use crate::error::{Error, Result};

pub const HEADER: [&str; 8] = [
    "Date",
    "Direction",
    "Sender",
    "Recipient",
    "Message",
    "Has Attachments",
    "Group Chat",
    "Service",
];

const YOU: &str = "You";

/// Render records as delimited text: header first, rows joined by `\n`.
pub fn render(records: &[MessageRecord], delimiter: char) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(HEADER.join(&delimiter.to_string()));
    for record in records {
        lines.push(render_row(record, delimiter));
    }
    lines.join("\n")
}

fn render_row(record: &MessageRecord, delimiter: char) -> String {
    let counterpart = record.counterpart();
    let (sender, recipient) = if record.is_from_me() {
        (YOU, counterpart)
    } else {
        (counterpart, YOU)
    };

    let cells = [
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        record.direction.label().to_string(),
        escape_cell(sender, delimiter),
        escape_cell(recipient, delimiter),
        record.text.as_deref().map(quote_text).unwrap_or_default(),
        if record.attachment_count > 0 { "Yes" } else { "No" }.to_string(),
        escape_cell(record.group_label.as_deref().unwrap_or(""), delimiter),
        escape_cell(&record.service, delimiter),
    ];
    cells.join(&delimiter.to_string())
}

/// Message bodies: always quoted, quotes doubled, line breaks become spaces.
fn quote_text(text: &str) -> String {
    let flattened = text
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('"', "\"\"");
    format!("\"{}\"", flattened)
}

/// Quote a cell only when it contains the delimiter, a quote, or a line break.
fn escape_cell(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains(['"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write the rendered export to `path` as UTF-8.
pub fn write(records: &[MessageRecord], path: &Path, delimiter: char) -> Result<()> {
    let rendered = render(records, delimiter);
    let mut file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(rendered.as_bytes())
        .map_err(|e| Error::io(path, e))?;

    tracing::info!(records = records.len(), path = ?path, "exported messages");
    Ok(())
}

/// `messages-YYYY-MM-DD.csv` in the working directory.
pub fn default_export_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("messages-{}.csv", date.format("%Y-%m-%d")))
}
