//! Message retrieval for resolved contacts.
//!
//! Full-history enumeration reads fixed-size batches and stops on the first
//! short batch. The live Messages client keeps writing to the store while we
//! read, so a `COUNT(*)` taken up front is only used to flag discrepancies.
//!
//! CHANGELOG:
//! - 10/19/2026 - Page by rows returned; lossy text decoding
//! - 10/19/2026 - Paged enumeration, count discrepancy logging
//! - 10/19/2026 - Initial MessageRecord assembly

use chrono::{DateTime, Utc};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::collections::BTreeSet;
use std::rc::Rc;

use super::queries;
use crate::contacts::ContactMap;
use crate::error::Result;

/// Records per store round-trip when enumerating full history.
pub const BATCH_SIZE: u32 = 50;

/// Date order requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn is_descending(self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Sent => "Sent",
            Direction::Received => "Received",
        }
    }
}

/// One message, enriched with its counterpart's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Raw store value (ns since 2001-01-01).
    pub native_timestamp: i64,
    pub direction: Direction,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    pub attachment_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub counterpart_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart_display_name: Option<String>,
}

impl MessageRecord {
    pub fn is_from_me(&self) -> bool {
        self.direction == Direction::Sent
    }

    /// Display name when known, otherwise the raw identifier.
    pub fn counterpart(&self) -> &str {
        self.counterpart_display_name
            .as_deref()
            .unwrap_or(&self.counterpart_identifier)
    }
}

/// Columns as they come out of [`queries::contact_messages`].
struct RawMessageRow {
    id: i64,
    text: Option<String>,
    date: i64,
    is_from_me: i64,
    service: Option<String>,
    group_name: Option<String>,
    attachment_count: i64,
    attachments: Option<String>,
    handle: String,
}

impl RawMessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: lossy_text(row, 1)?,
            date: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            is_from_me: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            service: lossy_text(row, 4)?,
            group_name: lossy_text(row, 5)?,
            attachment_count: row.get(6)?,
            attachments: lossy_text(row, 7)?,
            handle: lossy_text(row, 8)?.unwrap_or_default(),
        })
    }

    fn into_record(self, directory: &ContactMap) -> MessageRecord {
        let attachments: Vec<String> = self
            .attachments
            .map(|joined| {
                joined
                    .split('|')
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        MessageRecord {
            id: self.id,
            text: self.text,
            timestamp: queries::apple_epoch_nanos_to_utc(self.date),
            native_timestamp: self.date,
            direction: if self.is_from_me != 0 {
                Direction::Sent
            } else {
                Direction::Received
            },
            service: self.service.unwrap_or_default(),
            group_label: self.group_name,
            attachment_count: usize::try_from(self.attachment_count).unwrap_or(0),
            attachments,
            counterpart_display_name: directory.get(&self.handle).cloned(),
            counterpart_identifier: self.handle,
        }
    }
}

/// Text column that tolerates invalid UTF-8 written by older clients.
fn lossy_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
    })
}

/// One store round-trip: decoded records plus how many rows the store returned.
struct Batch {
    records: Vec<MessageRecord>,
    rows: u32,
}

/// Reads ordered, enriched message history from the store.
pub struct MessageRetriever<'a> {
    conn: &'a Connection,
    directory: &'a ContactMap,
    batch_size: u32,
}

impl<'a> MessageRetriever<'a> {
    pub fn new(conn: &'a Connection, directory: &'a ContactMap) -> Self {
        Self {
            conn,
            directory,
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the page size (tests, tuning).
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Messages exchanged with any of `identifiers`.
    ///
    /// With a limit this is one bounded query; without one, the whole history
    /// is enumerated page by page.
    pub fn fetch(
        &self,
        identifiers: &BTreeSet<String>,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<MessageRecord>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(limit) = limit {
            let ids = queries::to_sql_array(identifiers.iter().cloned());
            return Ok(self.query_page(&ids, order, i64::from(limit), 0)?.records);
        }

        let mut records = Vec::new();
        for page in self.pages(identifiers, order, None) {
            records.extend(page?);
        }

        let expected = self.count(identifiers)?;
        if expected != records.len() as u64 {
            tracing::warn!(
                expected,
                fetched = records.len(),
                "message count changed during enumeration"
            );
        }

        Ok(records)
    }

    /// Page-by-page enumeration; `limit` caps the total across all pages.
    pub fn pages(
        &self,
        identifiers: &BTreeSet<String>,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Pages<'_, 'a> {
        Pages {
            retriever: self,
            ids: queries::to_sql_array(identifiers.iter().cloned()),
            order,
            offset: 0,
            remaining: limit,
            done: identifiers.is_empty() || limit == Some(0),
        }
    }

    /// Total messages for `identifiers` at this moment.
    pub fn count(&self, identifiers: &BTreeSet<String>) -> Result<u64> {
        let ids = queries::to_sql_array(identifiers.iter().cloned());
        let count: i64 =
            self.conn
                .query_row(queries::CONTACT_MESSAGE_COUNT, [ids], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn query_page(
        &self,
        ids: &Rc<Vec<Value>>,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Batch> {
        let sql = queries::contact_messages(order.is_descending());
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![Rc::clone(ids), limit, offset], RawMessageRow::from_row)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut seen = 0u32;
        for row in rows {
            seen += 1;
            match row {
                Ok(raw) => records.push(raw.into_record(self.directory)),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(error = %e, "unreadable message row");
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, offset, "skipped unreadable message rows");
        }

        Ok(Batch {
            records,
            rows: seen,
        })
    }
}

/// Iterator over message batches; see [`MessageRetriever::pages`].
pub struct Pages<'r, 'a> {
    retriever: &'r MessageRetriever<'a>,
    ids: Rc<Vec<Value>>,
    order: SortOrder,
    offset: u32,
    remaining: Option<u32>,
    done: bool,
}

impl Iterator for Pages<'_, '_> {
    type Item = Result<Vec<MessageRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let requested = match self.remaining {
                Some(remaining) => remaining.min(self.retriever.batch_size),
                None => self.retriever.batch_size,
            };

            let batch = match self.retriever.query_page(
                &self.ids,
                self.order,
                i64::from(requested),
                i64::from(self.offset),
            ) {
                Ok(batch) => batch,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            // Size sentinel on rows returned, not rows decoded: a skipped row
            // must not end the enumeration.
            self.offset += batch.rows;
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= batch.rows.min(*remaining);
                if *remaining == 0 {
                    self.done = true;
                }
            }
            if batch.rows < requested {
                self.done = true;
            }

            if !batch.records.is_empty() {
                tracing::debug!(
                    batch = batch.records.len(),
                    offset = self.offset,
                    "fetched message batch"
                );
                return Some(Ok(batch.records));
            }
        }
        None
    }
}
