//! Query -> handle identifiers, via the directory map then the store.
//!
//! Matching cascade (each stage runs only when the previous found nothing):
//! 1. Directory map: phone suffix, exact email, or name (exact/token/substring)
//! 2. Direct `handle.id` lookup in Messages.db using normalized phone forms
//! 3. Empty set: "no matching contact", not an error
//!
//! Name matching takes the union of all three rules so an ambiguous name
//! over-matches rather than silently missing someone.
//!
//! CHANGELOG:
//! - 10/19/2026 - Store fallback with rarray() binding
//! - 10/19/2026 - Initial directory-backed cascade

use rusqlite::Connection;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::rc::Rc;

use super::cache::{ContactDirectoryCache, ContactMap};
use super::normalize::{digits_only, looks_like_phone, normalize_email, normalize_phone};
use crate::db::queries;
use crate::error::Result;

/// Which cascade stage produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Directory,
    Store,
    None,
}

/// Identifiers judged to match a query. Empty means no match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContactSet {
    identifiers: BTreeSet<String>,
    source: MatchSource,
}

impl ResolvedContactSet {
    pub fn empty() -> Self {
        Self {
            identifiers: BTreeSet::new(),
            source: MatchSource::None,
        }
    }

    fn from_stage(identifiers: BTreeSet<String>, source: MatchSource) -> Self {
        if identifiers.is_empty() {
            return Self::empty();
        }
        Self { identifiers, source }
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn source(&self) -> MatchSource {
        self.source
    }

    pub fn identifiers(&self) -> &BTreeSet<String> {
        &self.identifiers
    }
}

/// How a name query matched a display name (strongest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Token,
    Substring,
}

/// Classify a lowercased name query against a display name.
pub fn match_name(query_lower: &str, display_name: &str) -> Option<NameMatch> {
    let name = display_name.to_lowercase();
    if name == query_lower {
        Some(NameMatch::Exact)
    } else if name.split_whitespace().any(|token| token == query_lower) {
        Some(NameMatch::Token)
    } else if name.contains(query_lower) {
        Some(NameMatch::Substring)
    } else {
        None
    }
}

/// Stage 1: scan every `(identifier, display_name)` pair in the map.
pub fn match_directory(query: &str, directory: &ContactMap) -> BTreeSet<String> {
    let query = query.trim();
    if query.is_empty() {
        return BTreeSet::new();
    }

    if looks_like_phone(query) {
        let wanted = digits_only(query);
        return directory
            .keys()
            .filter(|id| {
                let have = digits_only(id);
                !have.is_empty() && (have == wanted || have.ends_with(&wanted))
            })
            .cloned()
            .collect();
    }

    if query.contains('@') {
        let wanted = normalize_email(query);
        return directory
            .keys()
            .filter(|id| id.to_lowercase() == wanted)
            .cloned()
            .collect();
    }

    let wanted = query.to_lowercase();
    directory
        .iter()
        .filter_map(|(id, name)| {
            let kind = match_name(&wanted, name)?;
            tracing::debug!(identifier = %id, %name, ?kind, "name match");
            Some(id.clone())
        })
        .collect()
}

/// Stage 2 candidates: the raw query plus every phone form it could take.
pub fn store_candidates(query: &str) -> Vec<String> {
    let query = query.trim();
    let digits = digits_only(query);

    let mut candidates = vec![query.to_string(), query.to_lowercase()];
    candidates.extend(normalize_phone(query));
    if !digits.is_empty() {
        candidates.push(digits.clone());
        candidates.push(format!("+{}", digits));
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| !c.is_empty() && seen.insert(c.clone()));
    candidates
}

/// Load the directory map, degrading to an empty map when access is refused.
///
/// Store-only phone/email matching still works without the directory.
pub fn directory_or_empty(cache: &mut ContactDirectoryCache) -> Result<Cow<'_, ContactMap>> {
    match cache.get() {
        Ok(map) => Ok(Cow::Borrowed(map)),
        Err(e) if e.is_access_refused() => {
            tracing::warn!(error = %e, "continuing without contact names");
            Ok(Cow::Owned(ContactMap::new()))
        }
        Err(e) => Err(e),
    }
}

/// Resolves free-form queries against a directory map and the store.
pub struct ContactResolver<'a> {
    directory: &'a ContactMap,
    conn: &'a Connection,
}

impl<'a> ContactResolver<'a> {
    pub fn new(directory: &'a ContactMap, conn: &'a Connection) -> Self {
        Self { directory, conn }
    }

    pub fn resolve(&self, query: &str) -> Result<ResolvedContactSet> {
        if query.trim().is_empty() {
            return Ok(ResolvedContactSet::empty());
        }

        let from_directory = match_directory(query, self.directory);
        if !from_directory.is_empty() {
            tracing::info!(count = from_directory.len(), "matched contacts in directory");
            return Ok(ResolvedContactSet::from_stage(from_directory, MatchSource::Directory));
        }

        tracing::info!(%query, "no directory matches, trying direct handle match");
        let from_store = self.match_store(query)?;
        if from_store.is_empty() {
            tracing::info!(%query, "no contacts found");
        }
        Ok(ResolvedContactSet::from_stage(from_store, MatchSource::Store))
    }

    fn match_store(&self, query: &str) -> Result<BTreeSet<String>> {
        let candidates = queries::to_sql_array(store_candidates(query));
        let mut stmt = self.conn.prepare(queries::HANDLES_BY_ID)?;
        let rows = stmt.query_map([Rc::clone(&candidates)], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<BTreeSet<String>>>()?)
    }
}
