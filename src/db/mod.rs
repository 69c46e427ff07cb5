//! Database module for read-only SQLite access to Messages.db.
//!
//! CHANGELOG:
//! - 10/19/2026 - Message retrieval and handle statistics
//! - 01/10/2026 - Initial module structure

pub mod connection;
pub mod handles;
pub mod messages;
pub mod queries;

pub use messages::{Direction, MessageRecord, MessageRetriever, SortOrder};
