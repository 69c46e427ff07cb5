//! Contact directory collaborator: the address book the cache is built from.
//!
//! CHANGELOG:
//! - 10/19/2026 - Fixed DirectoryContact record, ContactDirectory trait
//! - 10/19/2026 - JSON export file directory (flat and wrapped formats)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Authorization state reported by a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
}

/// One address book entry, with every name field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryContact {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
}

impl DirectoryContact {
    /// First non-empty of: full name, "given family", given, family.
    pub fn display_name(&self) -> Option<String> {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let given = non_empty(&self.given_name);
        let family = non_empty(&self.family_name);

        non_empty(&self.full_name)
            .or_else(|| match (&given, &family) {
                (Some(g), Some(f)) => Some(format!("{} {}", g, f)),
                _ => None,
            })
            .or(given)
            .or(family)
    }
}

/// Source of address book entries plus its authorization gate.
pub trait ContactDirectory {
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask for access; may block on user interaction.
    fn request_access(&self) -> Result<bool>;

    fn list_all_contacts(&self) -> Result<Vec<DirectoryContact>>;
}

/// Record shape accepted from a contacts export file.
///
/// Accepts both the directory shape (`fullName`, `phoneNumbers`, ...) and the
/// single-value shape (`name`, `phone`, `email`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedContact {
    #[serde(default, alias = "name")]
    full_name: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<String>,
    #[serde(default)]
    email_addresses: Vec<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl From<ExportedContact> for DirectoryContact {
    fn from(raw: ExportedContact) -> Self {
        let mut phone_numbers = raw.phone_numbers;
        phone_numbers.extend(raw.phone.filter(|p| !p.trim().is_empty()));
        let mut email_addresses = raw.email_addresses;
        email_addresses.extend(raw.email.filter(|e| !e.trim().is_empty()));

        Self {
            full_name: raw.full_name,
            given_name: raw.given_name,
            family_name: raw.family_name,
            phone_numbers,
            email_addresses,
        }
    }
}

/// Wrapper for the `{"contacts": [...]}` format.
#[derive(Debug, Deserialize)]
struct ContactsFile {
    contacts: Vec<ExportedContact>,
}

/// Parse a contacts export, wrapped format first, then a flat array.
pub fn parse_contacts_export(content: &str) -> serde_json::Result<Vec<DirectoryContact>> {
    if let Ok(wrapper) = serde_json::from_str::<ContactsFile>(content) {
        return Ok(wrapper.contacts.into_iter().map(Into::into).collect());
    }

    let contacts: Vec<ExportedContact> = serde_json::from_str(content)?;
    Ok(contacts.into_iter().map(Into::into).collect())
}

/// Directory backed by a JSON contacts export on disk.
///
/// A missing file means the directory was never granted (nothing exported),
/// so access requests are refused instead of failing hard.
pub struct JsonFileDirectory {
    path: PathBuf,
}

impl JsonFileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContactDirectory for JsonFileDirectory {
    fn authorization_status(&self) -> AuthorizationStatus {
        if self.path.is_file() {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::NotDetermined
        }
    }

    fn request_access(&self) -> Result<bool> {
        Ok(self.path.is_file())
    }

    fn list_all_contacts(&self) -> Result<Vec<DirectoryContact>> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        parse_contacts_export(&content).map_err(|e| {
            Error::Directory(format!("failed to parse contacts file {:?}: {}", self.path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(full: Option<&str>, given: Option<&str>, family: Option<&str>) -> DirectoryContact {
        DirectoryContact {
            full_name: full.map(String::from),
            given_name: given.map(String::from),
            family_name: family.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_name_precedence() {
        assert_eq!(
            contact(Some("Dana Lee"), Some("D"), Some("L")).display_name().as_deref(),
            Some("Dana Lee")
        );
        assert_eq!(
            contact(None, Some("Dana"), Some("Lee")).display_name().as_deref(),
            Some("Dana Lee")
        );
        assert_eq!(contact(Some("  "), Some("Dana"), None).display_name().as_deref(), Some("Dana"));
        assert_eq!(contact(None, None, Some("Lee")).display_name().as_deref(), Some("Lee"));
        assert_eq!(contact(None, Some(""), None).display_name(), None);
    }

    #[test]
    fn test_parse_flat_directory_shape() {
        let json = r#"[{"fullName": "Dana Lee", "phoneNumbers": ["+1 555 123 4567"], "emailAddresses": ["dana@example.com"]}]"#;
        let contacts = parse_contacts_export(json).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].full_name.as_deref(), Some("Dana Lee"));
        assert_eq!(contacts[0].phone_numbers, vec!["+1 555 123 4567"]);
        assert_eq!(contacts[0].email_addresses, vec!["dana@example.com"]);
    }

    #[test]
    fn test_parse_wrapped_single_value_shape() {
        let json = r#"{"contacts": [{"name": "Sam Ortiz", "phone": "+14155551234", "relationship_type": "friend"}]}"#;
        let contacts = parse_contacts_export(json).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].display_name().as_deref(), Some("Sam Ortiz"));
        assert_eq!(contacts[0].phone_numbers, vec!["+14155551234"]);
    }

    #[test]
    fn test_missing_file_refuses_access() {
        let dir = tempfile::tempdir().unwrap();
        let directory = JsonFileDirectory::new(dir.path().join("nope.json"));
        assert_eq!(directory.authorization_status(), AuthorizationStatus::NotDetermined);
        assert!(!directory.request_access().unwrap());
    }

    #[test]
    fn test_json_file_directory_lists_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, r#"[{"givenName": "Dana", "familyName": "Lee"}]"#).unwrap();

        let directory = JsonFileDirectory::new(&path);
        assert_eq!(directory.authorization_status(), AuthorizationStatus::Authorized);
        let contacts = directory.list_all_contacts().unwrap();
        assert_eq!(contacts[0].display_name().as_deref(), Some("Dana Lee"));
    }
}
