//! Two-tier contact directory cache: identifier -> display name.
//!
//! Memory tier lives on the [`ContactDirectoryCache`] value; the disk tier is a
//! single JSON object. A non-empty disk cache is trusted as-is with no
//! freshness check: contacts added after it was written stay invisible until
//! [`ContactDirectoryCache::invalidate`] (`--refresh-cache`).
//!
//! CHANGELOG:
//! - 10/19/2026 - Atomic persist, malformed-cache recovery
//! - 10/19/2026 - Initial two-tier cache

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::directory::{AuthorizationStatus, ContactDirectory};
use super::normalize::{normalize_email, normalize_phone};
use crate::error::{Error, Result};

/// Normalized identifier -> display name.
pub type ContactMap = BTreeMap<String, String>;

/// Counters from one rebuild, logged for diagnosis.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildStats {
    pub total: usize,
    pub skipped_no_name: usize,
    pub phones: usize,
    pub emails: usize,
    pub collisions: usize,
    pub mappings: usize,
}

/// Build the identifier map from directory contacts.
///
/// Last writer wins when two contacts share an identifier; the winner follows
/// the directory's enumeration order, which is not guaranteed stable.
pub fn build_contact_map(
    contacts: &[super::directory::DirectoryContact],
) -> (ContactMap, RebuildStats) {
    let mut map = ContactMap::new();
    let mut stats = RebuildStats {
        total: contacts.len(),
        ..Default::default()
    };

    for contact in contacts {
        let Some(display_name) = contact.display_name() else {
            stats.skipped_no_name += 1;
            continue;
        };

        let mut keys = Vec::new();
        for phone in &contact.phone_numbers {
            let forms = normalize_phone(phone);
            if forms.is_empty() {
                continue;
            }
            stats.phones += 1;
            keys.extend(forms);
        }

        for email in &contact.email_addresses {
            let email = normalize_email(email);
            if email.is_empty() {
                continue;
            }
            stats.emails += 1;
            keys.push(email);
        }

        for key in keys {
            if let Some(previous) = map.insert(key.clone(), display_name.clone()) {
                if previous != display_name {
                    stats.collisions += 1;
                    tracing::debug!(identifier = %key, %previous, winner = %display_name, "identifier collision");
                }
            }
        }
    }

    stats.mappings = map.len();
    (map, stats)
}

/// Default on-disk cache location.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imessage-history")
        .join("contact-cache.json")
}

/// Caller-owned contact cache over a [`ContactDirectory`].
pub struct ContactDirectoryCache {
    directory: Box<dyn ContactDirectory>,
    path: PathBuf,
    memory: Option<ContactMap>,
}

impl ContactDirectoryCache {
    pub fn new(directory: Box<dyn ContactDirectory>, path: impl Into<PathBuf>) -> Self {
        Self {
            directory,
            path: path.into(),
            memory: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the memory tier is populated.
    pub fn is_loaded(&self) -> bool {
        self.memory.is_some()
    }

    /// Memory tier, else disk tier, else a full rebuild.
    pub fn get(&mut self) -> Result<&ContactMap> {
        if self.memory.is_none() {
            match self.load_from_disk() {
                Ok(Some(map)) => {
                    tracing::info!(mappings = map.len(), path = ?self.path, "loaded contact cache");
                    self.memory = Some(map);
                }
                Ok(None) => {
                    self.rebuild()?;
                }
                Err(e @ Error::MalformedCache { .. }) => {
                    tracing::warn!(error = %e, "discarding contact cache");
                    self.remove_file()?;
                    self.rebuild()?;
                }
                Err(e) => return Err(e),
            }
        } else {
            tracing::debug!("using in-memory contact cache");
        }

        self.memory
            .as_ref()
            .ok_or_else(|| Error::Directory("contact cache not populated".into()))
    }

    /// Rebuild from the directory and persist when non-empty.
    pub fn rebuild(&mut self) -> Result<&ContactMap> {
        if self.directory.authorization_status() != AuthorizationStatus::Authorized {
            tracing::info!("requesting access to Contacts");
            if !self.directory.request_access()? {
                return Err(Error::PermissionDenied);
            }
        }

        let contacts = self.directory.list_all_contacts()?;
        let (map, stats) = build_contact_map(&contacts);
        tracing::info!(
            total = stats.total,
            skipped_no_name = stats.skipped_no_name,
            phones = stats.phones,
            emails = stats.emails,
            collisions = stats.collisions,
            mappings = stats.mappings,
            "built contact mapping"
        );

        if map.is_empty() {
            tracing::warn!("no contact mappings to cache");
        } else if let Err(e) = self.persist(&map) {
            tracing::warn!(error = %e, "failed to persist contact cache");
        }

        Ok(&*self.memory.insert(map))
    }

    /// Drop both tiers. A missing file is fine.
    pub fn invalidate(&mut self) -> Result<()> {
        self.memory = None;
        self.remove_file()
    }

    /// `Ok(None)` when the file is absent or holds an empty object.
    fn load_from_disk(&self) -> Result<Option<ContactMap>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let map: ContactMap =
            serde_json::from_str(&content).map_err(|source| Error::MalformedCache {
                path: self.path.clone(),
                source,
            })?;

        if map.is_empty() {
            tracing::info!("contact cache file is empty, rebuilding");
            return Ok(None);
        }
        Ok(Some(map))
    }

    /// Write to a sibling temp file, then rename over the cache.
    fn persist(&self, map: &ContactMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp_path = self.path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(map)?;
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &self.path)
        };

        write().map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            Error::io(&self.path, e)
        })?;

        tracing::info!(mappings = map.len(), path = ?self.path, "cached contacts to disk");
        Ok(())
    }

    fn remove_file(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = ?self.path, "cleared contact cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::directory::DirectoryContact;
    use std::cell::Cell;
    use std::rc::Rc;

    /// In-process directory that counts how often it is enumerated.
    struct FakeDirectory {
        contacts: Vec<DirectoryContact>,
        granted: bool,
        listed: Rc<Cell<usize>>,
    }

    impl ContactDirectory for FakeDirectory {
        fn authorization_status(&self) -> AuthorizationStatus {
            if self.granted {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            }
        }

        fn request_access(&self) -> Result<bool> {
            Ok(self.granted)
        }

        fn list_all_contacts(&self) -> Result<Vec<DirectoryContact>> {
            self.listed.set(self.listed.get() + 1);
            Ok(self.contacts.clone())
        }
    }

    fn dana() -> DirectoryContact {
        DirectoryContact {
            full_name: Some("Dana Lee".into()),
            phone_numbers: vec!["(555) 123-4567".into()],
            email_addresses: vec!["Dana@Example.com".into()],
            ..Default::default()
        }
    }

    fn cache_with(
        contacts: Vec<DirectoryContact>,
        granted: bool,
        path: &Path,
    ) -> (ContactDirectoryCache, Rc<Cell<usize>>) {
        let listed = Rc::new(Cell::new(0));
        let directory = FakeDirectory {
            contacts,
            granted,
            listed: Rc::clone(&listed),
        };
        (ContactDirectoryCache::new(Box::new(directory), path), listed)
    }

    #[test]
    fn test_build_contact_map_forms_and_skips() {
        let nameless = DirectoryContact {
            phone_numbers: vec!["5559990000".into()],
            ..Default::default()
        };
        let (map, stats) = build_contact_map(&[dana(), nameless]);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.skipped_no_name, 1);
        assert_eq!(stats.phones, 1);
        assert_eq!(stats.emails, 1);
        for key in ["5551234567", "+5551234567", "+15551234567", "dana@example.com"] {
            assert_eq!(map.get(key).map(String::as_str), Some("Dana Lee"), "{key}");
        }
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_short_phone_is_ignored() {
        let contact = DirectoryContact {
            full_name: Some("Short".into()),
            phone_numbers: vec!["555-1234".into()],
            ..Default::default()
        };
        let (map, stats) = build_contact_map(&[contact]);
        assert!(map.is_empty());
        assert_eq!(stats.phones, 0);
    }

    #[test]
    fn test_last_writer_wins_on_collision() {
        let other = DirectoryContact {
            full_name: Some("Dana's Work Line".into()),
            phone_numbers: vec!["+1 555 123 4567".into()],
            ..Default::default()
        };
        let (map, stats) = build_contact_map(&[dana(), other]);
        assert_eq!(map.get("+15551234567").map(String::as_str), Some("Dana's Work Line"));
        assert_eq!(map.get("5551234567").map(String::as_str), Some("Dana Lee"));
        assert_eq!(stats.collisions, 1);
    }

    #[test]
    fn test_round_trip_without_second_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let (mut cache, listed) = cache_with(vec![dana()], true, &path);

        let first = cache.get().unwrap().clone();
        assert_eq!(listed.get(), 1);
        assert!(path.is_file());

        let second = cache.get().unwrap().clone();
        assert_eq!(listed.get(), 1);
        assert_eq!(first, second);

        // A fresh cache value reads the disk tier instead of the directory.
        let (mut reopened, relisted) = cache_with(vec![dana()], true, &path);
        assert_eq!(reopened.get().unwrap(), &first);
        assert_eq!(relisted.get(), 0);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (mut cache, listed) = cache_with(vec![dana()], true, &path);

        cache.get().unwrap();
        cache.invalidate().unwrap();
        assert!(!cache.is_loaded());
        assert!(!path.exists());

        cache.get().unwrap();
        assert_eq!(listed.get(), 2);

        // Invalidating twice never fails on the missing file.
        cache.invalidate().unwrap();
        cache.invalidate().unwrap();
    }

    #[test]
    fn test_empty_disk_cache_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{}").unwrap();
        let (mut cache, listed) = cache_with(vec![dana()], true, &path);

        assert_eq!(cache.get().unwrap().len(), 4);
        assert_eq!(listed.get(), 1);
    }

    #[test]
    fn test_malformed_cache_is_discarded_and_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let (mut cache, listed) = cache_with(vec![dana()], true, &path);

        assert_eq!(cache.get().unwrap().len(), 4);
        assert_eq!(listed.get(), 1);
        let on_disk: ContactMap =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 4);
    }

    #[test]
    fn test_permission_denied_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (mut cache, listed) = cache_with(vec![dana()], false, &path);

        assert!(matches!(cache.get(), Err(Error::PermissionDenied)));
        assert_eq!(listed.get(), 0);
        assert!(!cache.is_loaded());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_rebuild_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let (mut cache, _) = cache_with(Vec::new(), true, &path);

        assert!(cache.get().unwrap().is_empty());
        assert!(!path.exists());
    }
}
