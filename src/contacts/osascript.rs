//! macOS Contacts.app directory via `osascript` (JavaScript for Automation).
//!
//! The first script run triggers the OS contacts permission prompt, which can
//! block indefinitely, so every invocation runs under a deadline.
//!
//! CHANGELOG:
//! - 10/19/2026 - Deadline-bounded osascript runner, JXA contact export

use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::directory::{AuthorizationStatus, ContactDirectory, DirectoryContact};
use crate::error::{Error, Result};

/// Default deadline for a single osascript run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Poll interval while waiting on the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Touches Contacts.app once; forces the permission prompt if undecided.
const PROBE_SCRIPT: &str = "Application('Contacts').people.length;";

/// Bulk property reads (one Apple Event per property, not per person).
const EXPORT_SCRIPT: &str = r#"
const people = Application('Contacts').people;
JSON.stringify({
    fullName: people.name(),
    givenName: people.firstName(),
    familyName: people.lastName(),
    phones: people.phones.value(),
    emails: people.emails.value()
});
"#;

/// Column-oriented export: index `i` of every array is the same person.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactColumns {
    full_name: Vec<Option<String>>,
    given_name: Vec<Option<String>>,
    family_name: Vec<Option<String>>,
    phones: Vec<Vec<Option<String>>>,
    emails: Vec<Vec<Option<String>>>,
}

impl ContactColumns {
    fn into_contacts(self) -> Vec<DirectoryContact> {
        let flatten = |values: Option<&Vec<Option<String>>>| -> Vec<String> {
            values
                .map(|v| v.iter().flatten().cloned().collect())
                .unwrap_or_default()
        };

        (0..self.full_name.len())
            .map(|i| DirectoryContact {
                full_name: self.full_name.get(i).cloned().flatten(),
                given_name: self.given_name.get(i).cloned().flatten(),
                family_name: self.family_name.get(i).cloned().flatten(),
                phone_numbers: flatten(self.phones.get(i)),
                email_addresses: flatten(self.emails.get(i)),
            })
            .collect()
    }
}

/// Outcome of one script run.
#[derive(Debug)]
struct ScriptOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Whether osascript stderr reports a Contacts authorization refusal.
///
/// -1743 is errAEEventNotPermitted; -1744 is the "would require consent" case.
pub fn is_authorization_error(stderr: &str) -> bool {
    stderr.contains("-1743")
        || stderr.contains("-1744")
        || stderr.contains("Not authorized")
        || stderr.contains("not allowed")
}

/// Contacts.app as a [`ContactDirectory`].
pub struct OsaScriptDirectory {
    timeout: Duration,
}

impl Default for OsaScriptDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl OsaScriptDirectory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a JXA script, killing osascript if it outlives the deadline.
    ///
    /// stdout/stderr are drained on reader threads so a large export cannot
    /// fill the pipe and stall the child.
    fn run(&self, script: &str) -> Result<ScriptOutput> {
        let mut child = Command::new("osascript")
            .arg("-l")
            .arg("JavaScript")
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Directory(format!("failed to launch osascript: {}", e)))?;

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(timeout = ?self.timeout, "osascript timed out, killed");
                    return Err(Error::AuthorizationTimeout(self.timeout));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(Error::Directory(format!("osascript wait failed: {}", e))),
            }
        };

        let join = |reader: Option<std::thread::JoinHandle<String>>| {
            reader.and_then(|h| h.join().ok()).unwrap_or_default()
        };

        Ok(ScriptOutput {
            success: status.success(),
            stdout: join(stdout_reader),
            stderr: join(stderr_reader),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

impl ContactDirectory for OsaScriptDirectory {
    /// osascript cannot query TCC state without prompting.
    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::NotDetermined
    }

    fn request_access(&self) -> Result<bool> {
        let output = self.run(PROBE_SCRIPT)?;
        if output.success {
            return Ok(true);
        }
        if is_authorization_error(&output.stderr) {
            return Ok(false);
        }
        Err(Error::Directory(format!(
            "Contacts probe failed: {}",
            output.stderr.trim()
        )))
    }

    fn list_all_contacts(&self) -> Result<Vec<DirectoryContact>> {
        let output = self.run(EXPORT_SCRIPT)?;
        if !output.success {
            if is_authorization_error(&output.stderr) {
                return Err(Error::PermissionDenied);
            }
            return Err(Error::Directory(format!(
                "Contacts export failed: {}",
                output.stderr.trim()
            )));
        }

        let columns: ContactColumns = serde_json::from_str(output.stdout.trim())?;
        Ok(columns.into_contacts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_error_detection() {
        assert!(is_authorization_error(
            "execution error: Error: Not authorized to send Apple events to Contacts. (-1743)"
        ));
        assert!(!is_authorization_error("execution error: Error: Can't get object. (-1728)"));
    }

    #[test]
    fn test_columns_into_contacts() {
        let json = r#"{
            "fullName": ["Dana Lee", null],
            "givenName": ["Dana", "Sam"],
            "familyName": ["Lee", null],
            "phones": [["+1 555 123 4567", null], []],
            "emails": [["dana@example.com"], ["sam@example.com"]]
        }"#;
        let columns: ContactColumns = serde_json::from_str(json).unwrap();
        let contacts = columns.into_contacts();

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].phone_numbers, vec!["+1 555 123 4567"]);
        assert_eq!(contacts[1].full_name, None);
        assert_eq!(contacts[1].display_name().as_deref(), Some("Sam"));
        assert_eq!(contacts[1].email_addresses, vec!["sam@example.com"]);
    }

    #[test]
    fn test_status_is_undetermined() {
        let dir = OsaScriptDirectory::default();
        assert_eq!(dir.authorization_status(), AuthorizationStatus::NotDetermined);
    }
}
