//! Per-handle activity statistics.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial handle listing for the contacts command

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::queries;
use crate::error::Result;

/// One phone number or email with message history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleSummary {
    pub identifier: String,
    pub service: Option<String>,
    pub message_count: u64,
    pub first_message: DateTime<Utc>,
    pub last_message: DateTime<Utc>,
    pub group_chats: Vec<String>,
}

/// Every handle with at least one message, most recently active first.
pub fn list_handles(conn: &Connection) -> Result<Vec<HandleSummary>> {
    let mut stmt = conn.prepare(queries::HANDLE_SUMMARIES)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<i64>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut handles = Vec::new();
    for row in rows {
        let (identifier, service, count, first, last, groups) = row?;

        let mut group_chats: Vec<String> = Vec::new();
        for name in groups.as_deref().unwrap_or("").split('|') {
            if !name.is_empty() && !group_chats.iter().any(|g| g == name) {
                group_chats.push(name.to_string());
            }
        }

        handles.push(HandleSummary {
            identifier,
            service,
            message_count: u64::try_from(count).unwrap_or(0),
            first_message: queries::apple_epoch_nanos_to_utc(first.unwrap_or(0)),
            last_message: queries::apple_epoch_nanos_to_utc(last.unwrap_or(0)),
            group_chats,
        });
    }

    Ok(handles)
}
