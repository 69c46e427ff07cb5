//! SQL queries and timestamp conversion for Messages.db.
//!
//! Identifier lists are bound as a single array parameter through the
//! `rarray()` table-valued function, never spliced into the SQL text.
//!
//! CHANGELOG:
//! - 10/19/2026 - Contact history, handle lookup and handle stats queries
//! - 01/10/2026 - Initial stub with query constants

use chrono::{DateTime, Local, TimeZone, Utc};
use rusqlite::types::Value;
use std::rc::Rc;

/// Handles whose `id` is one of the bound candidates.
/// Parameters: ?1 = rarray of candidate identifiers
pub const HANDLES_BY_ID: &str = r#"
SELECT DISTINCT id
FROM handle
WHERE id IN rarray(?1)
ORDER BY id
"#;

/// Message history for a set of handles, one row per message.
///
/// Attachment count and filenames come from per-message subqueries so a chat
/// join can never multiply them. Ordering is appended by [`contact_messages`].
/// Parameters: ?1 = rarray of handle ids, ?2 = limit (-1 = none), ?3 = offset
const CONTACT_MESSAGES_BASE: &str = r#"
SELECT
    m.ROWID,
    m.text,
    m.date,
    m.is_from_me,
    COALESCE(m.service, h.service) AS service,
    MAX(NULLIF(c.display_name, '')) AS group_name,
    (SELECT COUNT(*)
       FROM message_attachment_join maj
      WHERE maj.message_id = m.ROWID) AS attachment_count,
    (SELECT GROUP_CONCAT(a.filename, '|')
       FROM message_attachment_join maj
       JOIN attachment a ON a.ROWID = maj.attachment_id
      WHERE maj.message_id = m.ROWID) AS attachments,
    h.id AS handle
FROM message m
JOIN handle h ON h.ROWID = m.handle_id
LEFT JOIN chat_message_join cmj ON cmj.message_id = m.ROWID
LEFT JOIN chat c ON c.ROWID = cmj.chat_id
WHERE h.id IN rarray(?1)
GROUP BY m.ROWID
"#;

/// Full contact history query for the given date order.
///
/// Row id breaks ties ascending in both directions since native timestamps
/// are not unique.
pub fn contact_messages(descending: bool) -> String {
    let direction = if descending { "DESC" } else { "ASC" };
    format!(
        "{}ORDER BY m.date {}, m.ROWID ASC\nLIMIT ?2 OFFSET ?3\n",
        CONTACT_MESSAGES_BASE, direction
    )
}

/// Number of messages for a set of handles.
/// Parameters: ?1 = rarray of handle ids
pub const CONTACT_MESSAGE_COUNT: &str = r#"
SELECT COUNT(DISTINCT m.ROWID)
FROM message m
JOIN handle h ON h.ROWID = m.handle_id
WHERE h.id IN rarray(?1)
"#;

/// Every handle with message history, most recently active first.
pub const HANDLE_SUMMARIES: &str = r#"
SELECT
    h.id,
    h.service,
    COUNT(m.ROWID) AS message_count,
    MIN(m.date) AS first_date,
    MAX(m.date) AS last_date,
    (SELECT GROUP_CONCAT(c.display_name, '|')
       FROM chat_handle_join chj
       JOIN chat c ON c.ROWID = chj.chat_id
      WHERE chj.handle_id = h.ROWID
        AND c.display_name IS NOT NULL
        AND c.display_name != '') AS group_chats
FROM handle h
JOIN message m ON m.handle_id = h.ROWID
GROUP BY h.ROWID
HAVING message_count > 0
ORDER BY last_date DESC, h.id ASC
"#;

/// Bind a list of strings as one `rarray()` parameter.
pub fn to_sql_array<I>(values: I) -> Rc<Vec<Value>>
where
    I: IntoIterator<Item = String>,
{
    Rc::new(values.into_iter().map(Value::from).collect())
}

/// Cocoa epoch offset (2001-01-01 in Unix time).
pub const COCOA_EPOCH_OFFSET: i64 = 978_307_200;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a native Messages.db timestamp (ns since 2001-01-01 UTC) to UTC.
pub fn apple_epoch_nanos_to_utc(cocoa_ns: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(cocoa_ns.saturating_add(COCOA_EPOCH_OFFSET * NANOS_PER_SEC))
}

/// Same instant in the machine's local time zone, for display.
pub fn apple_epoch_nanos_to_local(cocoa_ns: i64) -> DateTime<Local> {
    apple_epoch_nanos_to_utc(cocoa_ns).with_timezone(&Local)
}
