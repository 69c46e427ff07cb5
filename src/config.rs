//! Runtime settings: CLI flags, then environment (via clap), then defaults.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial settings with tilde expansion and directory selection

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::contacts::cache::default_cache_path;
use crate::contacts::osascript;
use crate::contacts::{ContactDirectory, ContactDirectoryCache, JsonFileDirectory, OsaScriptDirectory};
use crate::db::connection;
use crate::error::Result;

pub const DB_PATH_ENV: &str = "IMESSAGE_DB_PATH";
pub const CACHE_PATH_ENV: &str = "IMESSAGE_CONTACT_CACHE";
pub const CONTACTS_PATH_ENV: &str = "IMESSAGE_CONTACTS_PATH";
pub const DIRECTORY_TIMEOUT_ENV: &str = "IMESSAGE_DIRECTORY_TIMEOUT";

/// Fully resolved paths and limits for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub cache_path: PathBuf,
    /// Explicit contacts export; `None` means the platform default.
    pub contacts_file: Option<PathBuf>,
    pub directory_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: connection::default_db_path(),
            cache_path: default_cache_path(),
            contacts_file: None,
            directory_timeout: osascript::DEFAULT_TIMEOUT,
        }
    }
}

impl Settings {
    /// Fill unset values from defaults and expand `~` in every path.
    pub fn resolve(
        db: Option<&str>,
        cache: Option<&str>,
        contacts_file: Option<&str>,
        directory_timeout_secs: Option<u64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            db_path: db.map(expand_path).unwrap_or(defaults.db_path),
            cache_path: cache.map(expand_path).unwrap_or(defaults.cache_path),
            contacts_file: contacts_file.map(expand_path),
            directory_timeout: directory_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.directory_timeout),
        }
    }

    /// The contact directory for this platform and configuration.
    ///
    /// An explicit contacts file always wins. Otherwise macOS reads
    /// Contacts.app and other platforms fall back to a JSON file in the
    /// config directory.
    pub fn open_directory(&self) -> Box<dyn ContactDirectory> {
        if let Some(path) = &self.contacts_file {
            tracing::debug!(path = ?path, "using contacts export file");
            return Box::new(JsonFileDirectory::new(path.clone()));
        }

        if cfg!(target_os = "macos") {
            Box::new(OsaScriptDirectory::new(self.directory_timeout))
        } else {
            Box::new(JsonFileDirectory::new(default_contacts_path()))
        }
    }

    pub fn open_cache(&self) -> ContactDirectoryCache {
        ContactDirectoryCache::new(self.open_directory(), self.cache_path.clone())
    }

    pub fn open_store(&self) -> Result<Connection> {
        connection::open_db(&self.db_path)
    }
}

/// `<config_dir>/imessage-history/contacts.json`
pub fn default_contacts_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imessage-history")
        .join("contacts.json")
}

fn expand_path(raw: &str) -> PathBuf {
    Path::new(shellexpand::tilde(raw).as_ref()).to_path_buf()
}
