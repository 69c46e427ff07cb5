//! Contacts command: every handle with message history, named from the
//! contact directory where possible.
//!
//! CHANGELOG:
//! - 10/19/2026 - Handle statistics with directory names
//! - 01/10/2026 - Initial stub implementation

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Settings;
use crate::contacts::resolver::directory_or_empty;
use crate::db::handles::{self, HandleSummary};
use crate::output::{self, OutputControls};

#[derive(Debug, Serialize)]
struct ContactListing<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(flatten)]
    handle: &'a HandleSummary,
}

/// List all handles with message counts and names.
pub fn list(settings: &Settings, output: &OutputControls) -> Result<()> {
    let conn = settings
        .open_store()
        .context("Failed to open Messages database")?;
    let handles = handles::list_handles(&conn).context("Failed to list handles")?;

    let mut cache = settings.open_cache();
    let directory = directory_or_empty(&mut cache).context("Failed to load contacts")?;

    if output.json {
        let listings: Vec<ContactListing<'_>> = handles
            .iter()
            .map(|handle| ContactListing {
                display_name: directory.get(&handle.identifier).map(String::as_str),
                handle,
            })
            .collect();
        output.print(&listings);
        return Ok(());
    }

    if handles.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    print!("{}", output::render_handles(&handles, &directory));
    Ok(())
}
