//! SQLite connection management for Messages.db.
//!
//! CHANGELOG:
//! - 10/19/2026 - Configurable path, StoreUnavailable error, rarray module
//! - 01/10/2026 - Initial stub

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default Messages.db path.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Library")
        .join("Messages")
        .join("chat.db")
}

/// Register what every store connection needs (the `rarray()` table function).
pub fn prepare(conn: &Connection) -> Result<()> {
    rusqlite::vtab::array::load_module(conn)?;
    Ok(())
}

/// Open a read-only connection to Messages.db.
///
/// The connection closes on drop, so every exit path of the caller releases
/// the store.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| Error::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    // Opening is lazy; touch the schema so permission and lock errors surface here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|source| Error::StoreUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    prepare(&conn)?;
    tracing::debug!(path = ?path, "opened Messages database");
    Ok(conn)
}
