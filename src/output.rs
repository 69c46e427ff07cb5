//! Output formatting and control utilities.
//!
//! JSON output goes through [`OutputControls`]; the human-readable renderers
//! build plain strings so they can be tested without capturing stdout.
//!
//! CHANGELOG:
//! - 10/19/2026 - Message listing, match list, handle table; char-safe truncation
//! - 01/10/2026 - Initial implementation

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write as _;

use crate::contacts::{ContactMap, ResolvedContactSet};
use crate::db::handles::HandleSummary;
use crate::db::MessageRecord;

/// Output control settings from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct OutputControls {
    pub json: bool,
    pub compact: bool,
    pub fields: Option<String>,
    pub max_text_chars: Option<u32>,
}

impl OutputControls {
    /// Emit data according to output controls.
    pub fn emit<T: Serialize>(&self, data: &T) -> String {
        let value = serde_json::to_value(data).unwrap_or(json!(null));

        let filtered = match self.fields {
            Some(ref fields) => filter_fields(&value, fields),
            None => value,
        };

        let truncated = match self.max_text_chars {
            Some(max_chars) => truncate_text_fields(&filtered, max_chars as usize),
            None => filtered,
        };

        if self.compact {
            serde_json::to_string(&truncated).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string_pretty(&truncated).unwrap_or_else(|_| "{}".to_string())
        }
    }

    /// Print data to stdout according to output controls.
    pub fn print<T: Serialize>(&self, data: &T) {
        println!("{}", self.emit(data));
    }

    /// Truncate a display string the same way JSON text fields are.
    pub fn clip<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_text_chars {
            Some(max) => truncate_chars(text, max as usize),
            None => std::borrow::Cow::Borrowed(text),
        }
    }
}

/// Filter JSON value to only include specified fields.
fn filter_fields(value: &Value, fields: &str) -> Value {
    let field_list: Vec<&str> = fields.split(',').map(|s| s.trim()).collect();

    match value {
        Value::Array(arr) => {
            Value::Array(arr.iter().map(|v| filter_fields(v, fields)).collect())
        }
        Value::Object(map) => {
            let mut filtered = serde_json::Map::new();
            for field in &field_list {
                if let Some(v) = map.get(*field) {
                    filtered.insert(field.to_string(), v.clone());
                }
            }
            Value::Object(filtered)
        }
        _ => value.clone(),
    }
}

/// Cut at a char boundary; byte slicing would panic on multi-byte text.
fn truncate_chars(s: &str, max_chars: usize) -> std::borrow::Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => std::borrow::Cow::Owned(format!("{}...", &s[..idx])),
        None => std::borrow::Cow::Borrowed(s),
    }
}

/// Truncate string fields in JSON value.
fn truncate_text_fields(value: &Value, max_chars: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_chars(s, max_chars).into_owned()),
        Value::Array(arr) => {
            Value::Array(arr.iter().map(|v| truncate_text_fields(v, max_chars)).collect())
        }
        Value::Object(map) => {
            let mut truncated = serde_json::Map::new();
            for (k, v) in map {
                truncated.insert(k.clone(), truncate_text_fields(v, max_chars));
            }
            Value::Object(truncated)
        }
        _ => value.clone(),
    }
}

/// Format error as JSON.
pub fn format_error(error: &str) -> String {
    serde_json::to_string(&json!({
        "error": error,
        "success": false
    }))
    .unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, error))
}

/// Matched identifiers, each led by its directory name when known.
pub fn render_matches(resolved: &ResolvedContactSet, directory: &ContactMap) -> String {
    let mut out = format!("Found {} matching contact(s):\n", resolved.len());
    for identifier in resolved.iter() {
        match directory.get(identifier) {
            Some(name) => {
                let _ = writeln!(out, "  - {} ({})", name, identifier);
            }
            None => {
                let _ = writeln!(out, "  - {}", identifier);
            }
        }
    }
    out
}

/// Numbered message listing followed by a summary block.
pub fn render_messages(records: &[MessageRecord], controls: &OutputControls) -> String {
    let mut out = String::new();

    for (i, record) in records.iter().enumerate() {
        let arrow = if record.is_from_me() { "→" } else { "←" };
        let sender = if record.is_from_me() { "You" } else { record.counterpart() };
        let date = crate::db::queries::apple_epoch_nanos_to_local(record.native_timestamp)
            .format("%Y-%m-%d %H:%M:%S");

        let _ = write!(out, "\n{}. [{}] {} {}", i + 1, date, sender, arrow);
        if let Some(group) = &record.group_label {
            let _ = write!(out, " ({})", group);
        }
        out.push('\n');

        if let Some(text) = record.text.as_deref().filter(|t| !t.is_empty()) {
            let _ = writeln!(out, "   {}", controls.clip(text));
        }
        if record.attachment_count > 0 {
            let _ = writeln!(out, "   Attachments: {}", record.attachment_count);
        }
    }

    let from_me = records.iter().filter(|r| r.is_from_me()).count();
    let with_attachments = records.iter().filter(|r| r.attachment_count > 0).count();

    out.push_str("\nSummary:\n");
    out.push_str(&"-".repeat(40));
    let _ = writeln!(out, "\nTotal messages: {}", records.len());
    let _ = writeln!(out, "From you: {}", from_me);
    let _ = writeln!(out, "From them: {}", records.len() - from_me);
    if with_attachments > 0 {
        let _ = writeln!(out, "Messages with attachments: {}", with_attachments);
    }
    out
}

/// Table of handles with their directory names.
pub fn render_handles(handles: &[HandleSummary], directory: &ContactMap) -> String {
    let mut out = format!("Contacts with message history ({}):\n", handles.len());
    out.push_str(&"-".repeat(60));
    out.push('\n');

    for handle in handles {
        let name = directory
            .get(&handle.identifier)
            .map(String::as_str)
            .unwrap_or("(unknown)");
        let _ = writeln!(
            out,
            "{} | {} | {} messages | last {}",
            name,
            handle.identifier,
            handle.message_count,
            handle.last_message.format("%Y-%m-%d"),
        );
        if !handle.group_chats.is_empty() {
            let _ = writeln!(out, "    groups: {}", handle.group_chats.join(", "));
        }
    }
    out
}
