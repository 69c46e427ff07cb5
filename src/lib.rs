//! imessage-history library
//!
//! Resolves a name, phone number or email to contact identifiers and reads
//! the matching history from the local Messages database.
//!
//! CHANGELOG:
//! - 10/19/2026 - Resolution engine, paged retrieval, CSV export
//! - 01/10/2026 - Initial library structure

pub mod commands;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod export;
pub mod output;

pub use error::{Error, Result};
