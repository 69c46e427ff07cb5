//! Command implementations.
//!
//! CHANGELOG:
//! - 10/19/2026 - search and contacts commands
//! - 01/10/2026 - Initial module structure

pub mod contacts;
pub mod search;
