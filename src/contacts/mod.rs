//! Contact resolution: directory access, identifier normalization, caching,
//! and the query matching cascade.
//!
//! CHANGELOG:
//! - 10/19/2026 - Directory trait, two-tier cache, resolver cascade

pub mod cache;
pub mod directory;
pub mod normalize;
pub mod osascript;
pub mod resolver;

pub use cache::{ContactDirectoryCache, ContactMap};
pub use directory::{AuthorizationStatus, ContactDirectory, DirectoryContact, JsonFileDirectory};
pub use osascript::OsaScriptDirectory;
pub use resolver::{ContactResolver, MatchSource, ResolvedContactSet};
