//! Search command: resolve a query to contacts, then print or export their
//! message history.
//!
//! CHANGELOG:
//! - 10/19/2026 - Cache refresh, CSV export, store fallback when Contacts is denied
//! - 10/19/2026 - Initial search pipeline

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;
use std::path::PathBuf;

use crate::config::Settings;
use crate::contacts::resolver::directory_or_empty;
use crate::contacts::{ContactMap, ContactResolver, ResolvedContactSet};
use crate::db::{MessageRecord, MessageRetriever, SortOrder};
use crate::export::csv;
use crate::output::{self, OutputControls};

/// Default number of messages when `--limit` is not given.
pub const DEFAULT_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub order: SortOrder,
    /// `None` enumerates the full history.
    pub limit: Option<u32>,
    /// `Some(None)` exports to the dated default path.
    pub csv: Option<Option<PathBuf>>,
    pub delimiter: char,
    pub refresh_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            order: SortOrder::Desc,
            limit: Some(DEFAULT_LIMIT),
            csv: None,
            delimiter: ',',
            refresh_cache: false,
        }
    }
}

/// What a search found; empty fields are normal outcomes, not errors.
#[derive(Debug)]
pub struct SearchOutcome {
    pub contacts: ResolvedContactSet,
    pub messages: Vec<MessageRecord>,
}

/// Resolve and retrieve against an already-loaded directory map.
pub fn find_messages(
    conn: &Connection,
    directory: &ContactMap,
    query: &str,
    order: SortOrder,
    limit: Option<u32>,
) -> Result<SearchOutcome> {
    let contacts = ContactResolver::new(directory, conn)
        .resolve(query)
        .with_context(|| format!("Failed to resolve contacts for {:?}", query))?;

    if contacts.is_empty() {
        return Ok(SearchOutcome {
            contacts,
            messages: Vec::new(),
        });
    }

    let messages = MessageRetriever::new(conn, directory)
        .fetch(contacts.identifiers(), order, limit)
        .context("Failed to read messages")?;

    Ok(SearchOutcome { contacts, messages })
}

pub fn run(
    settings: &Settings,
    query: &str,
    options: &SearchOptions,
    output: &OutputControls,
) -> Result<()> {
    let conn = settings
        .open_store()
        .context("Failed to open Messages database")?;

    let mut cache = settings.open_cache();
    if options.refresh_cache {
        cache.invalidate().context("Failed to clear contact cache")?;
        if !output.json {
            println!("Cleared contact cache at {}", cache.path().display());
        }
    }
    let directory = directory_or_empty(&mut cache).context("Failed to load contacts")?;

    if !output.json {
        println!("Searching for messages with \"{}\"...", query);
    }

    let outcome = find_messages(&conn, &directory, query, options.order, options.limit)?;

    if outcome.contacts.is_empty() {
        if output.json {
            output.print(&outcome.messages);
        } else {
            println!("No matching contacts found for \"{}\".", query);
        }
        return Ok(());
    }

    if outcome.messages.is_empty() {
        if output.json {
            output.print(&outcome.messages);
        } else {
            print!("{}", output::render_matches(&outcome.contacts, &directory));
            println!("No messages found with these contacts.");
        }
        return Ok(());
    }

    if output.json {
        output.print(&outcome.messages);
    } else {
        print!("{}", output::render_matches(&outcome.contacts, &directory));
        println!("Found {} messages", outcome.messages.len());
        print!("{}", output::render_messages(&outcome.messages, output));
    }

    if let Some(target) = &options.csv {
        let path = target
            .clone()
            .unwrap_or_else(|| csv::default_export_path(Local::now().date_naive()));
        csv::write(&outcome.messages, &path, options.delimiter)
            .with_context(|| format!("Failed to export messages to {:?}", path))?;
        if !output.json {
            println!("\nExported {} messages to {}", outcome.messages.len(), path.display());
        }
    }

    Ok(())
}
