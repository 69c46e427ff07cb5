//! End-to-end search against a synthetic Messages database.

use std::path::{Path, PathBuf};

use imessage_history::commands::search::find_messages;
use imessage_history::config::Settings;
use imessage_history::contacts::resolver::directory_or_empty;
use imessage_history::contacts::{ContactDirectoryCache, JsonFileDirectory, MatchSource};
use imessage_history::db::connection::open_db;
use imessage_history::db::{Direction, MessageRetriever, SortOrder};
use imessage_history::export::csv;
use imessage_history::Error;
use rusqlite::{params, Connection};
use tempfile::TempDir;

/// 2025-01-01T00:00:00Z in store time.
const BASE_NS: i64 = 757_382_400_000_000_000;
const MINUTE_NS: i64 = 60_000_000_000;

struct Fixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chat.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT NOT NULL, service TEXT);
            CREATE TABLE message (
                ROWID INTEGER PRIMARY KEY, text TEXT, date INTEGER, is_from_me INTEGER,
                handle_id INTEGER, service TEXT, cache_roomnames TEXT
            );
            CREATE TABLE chat (ROWID INTEGER PRIMARY KEY, display_name TEXT);
            CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
            CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
            CREATE TABLE attachment (ROWID INTEGER PRIMARY KEY, filename TEXT);
            CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);

            INSERT INTO handle VALUES (1, '+15551234567', 'iMessage'),
                                      (2, 'dana', 'iMessage'),
                                      (3, '+14155550000', 'SMS');
            INSERT INTO chat VALUES (1, 'Book Club');
            INSERT INTO chat_handle_join VALUES (1, 1);
            "#,
        )
        .unwrap();

        let messages: [(i64, &str, i64, bool, i64); 5] = [
            (1, "Hi Dana", 0, true, 1),
            (2, "He said \"hi\"\nagain", 1, false, 1),
            (3, "See you at book club", 2, false, 1),
            (4, "from the name handle", 3, false, 2),
            (5, "someone else", 4, false, 3),
        ];
        for (id, text, minutes, from_me, handle) in messages {
            conn.execute(
                "INSERT INTO message (ROWID, text, date, is_from_me, handle_id, service)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'iMessage')",
                params![id, text, BASE_NS + minutes * MINUTE_NS, from_me as i64, handle],
            )
            .unwrap();
        }
        conn.execute_batch(
            r#"
            INSERT INTO chat_message_join VALUES (1, 3);
            INSERT INTO attachment VALUES (1, '~/Library/Messages/Attachments/a.jpg'),
                                          (2, '~/Library/Messages/Attachments/b.jpg');
            INSERT INTO message_attachment_join VALUES (3, 1), (3, 2);
            "#,
        )
        .unwrap();

        Self { dir, db_path }
    }

    fn contacts_file(&self) -> PathBuf {
        let path = self.dir.path().join("contacts.json");
        std::fs::write(
            &path,
            r#"{"contacts": [
                {"fullName": "Dana Lee", "phoneNumbers": ["(555) 123-4567"]},
                {"name": "Leonard Mills", "phone": "415-555-0000"}
            ]}"#,
        )
        .unwrap();
        path
    }

    fn settings(&self, contacts_file: Option<PathBuf>) -> Settings {
        Settings {
            db_path: self.db_path.clone(),
            cache_path: self.dir.path().join("cache").join("contacts.json"),
            contacts_file,
            ..Settings::default()
        }
    }
}

#[test]
fn test_phone_query_ascending_with_limit() {
    let fixture = Fixture::new();
    let settings = fixture.settings(Some(fixture.contacts_file()));
    let conn = settings.open_store().unwrap();
    let mut cache = settings.open_cache();
    let directory = directory_or_empty(&mut cache).unwrap();

    let outcome = find_messages(&conn, &directory, "555-123-4567", SortOrder::Asc, Some(2)).unwrap();

    assert_eq!(outcome.contacts.source(), MatchSource::Directory);
    assert!(outcome.contacts.contains("+15551234567"));
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.messages[0].id, 1);
    assert_eq!(outcome.messages[1].id, 2);
    assert!(outcome.messages[0].timestamp < outcome.messages[1].timestamp);
    for message in &outcome.messages {
        assert_eq!(message.counterpart(), "Dana Lee");
    }
    assert_eq!(outcome.messages[0].direction, Direction::Sent);
}

#[test]
fn test_cache_persists_between_runs() {
    let fixture = Fixture::new();
    let settings = fixture.settings(Some(fixture.contacts_file()));

    let first = settings.open_cache().get().unwrap().clone();
    assert!(settings.cache_path.is_file());

    // Remove the source; the disk tier must still answer.
    std::fs::remove_file(settings.contacts_file.as_ref().unwrap()).unwrap();
    let second = settings.open_cache().get().unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(second.get("+14155550000").map(String::as_str), Some("Leonard Mills"));
}

#[test]
fn test_denied_directory_falls_back_to_store() {
    let fixture = Fixture::new();
    let missing = fixture.dir.path().join("no-contacts.json");
    let conn = open_db(&fixture.db_path).unwrap();

    let mut cache = ContactDirectoryCache::new(
        Box::new(JsonFileDirectory::new(&missing)),
        fixture.dir.path().join("cache.json"),
    );
    assert!(matches!(cache.get(), Err(Error::PermissionDenied)));

    let directory = directory_or_empty(&mut cache).unwrap();
    assert!(directory.is_empty());

    let outcome = find_messages(&conn, &directory, "dana", SortOrder::Desc, None).unwrap();
    assert_eq!(outcome.contacts.source(), MatchSource::Store);
    assert!(outcome.contacts.contains("dana"));
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(outcome.messages[0].counterpart(), "dana");

    let by_phone = find_messages(&conn, &directory, "5551234567", SortOrder::Desc, None).unwrap();
    assert_eq!(by_phone.messages.len(), 3);
    assert_eq!(by_phone.messages[0].id, 3);
}

#[test]
fn test_unknown_query_is_empty_not_error() {
    let fixture = Fixture::new();
    let settings = fixture.settings(Some(fixture.contacts_file()));
    let conn = settings.open_store().unwrap();
    let mut cache = settings.open_cache();
    let directory = directory_or_empty(&mut cache).unwrap();

    let outcome = find_messages(&conn, &directory, "Nobody Atall", SortOrder::Desc, None).unwrap();
    assert!(outcome.contacts.is_empty());
    assert_eq!(outcome.contacts.source(), MatchSource::None);
    assert!(outcome.messages.is_empty());
}

#[test]
fn test_group_label_and_attachments() {
    let fixture = Fixture::new();
    let conn = open_db(&fixture.db_path).unwrap();
    let directory = Default::default();

    let outcome = find_messages(&conn, &directory, "+15551234567", SortOrder::Desc, None).unwrap();
    let club = outcome.messages.iter().find(|m| m.id == 3).unwrap();
    assert_eq!(club.group_label.as_deref(), Some("Book Club"));
    assert_eq!(club.attachment_count, 2);
    assert_eq!(club.attachments.len(), 2);

    let retriever = MessageRetriever::new(&conn, &directory);
    let ids = outcome.contacts.identifiers();
    assert_eq!(retriever.count(ids).unwrap(), 3);
}

#[test]
fn test_export_flattens_message_text() {
    let fixture = Fixture::new();
    let settings = fixture.settings(Some(fixture.contacts_file()));
    let conn = settings.open_store().unwrap();
    let mut cache = settings.open_cache();
    let directory = directory_or_empty(&mut cache).unwrap();

    let outcome = find_messages(&conn, &directory, "Dana Lee", SortOrder::Asc, None).unwrap();
    let out_path = fixture.dir.path().join("export.csv");
    csv::write(&outcome.messages, &out_path, ',').unwrap();

    let content = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[2],
        "2025-01-01T00:01:00.000Z,Received,Dana Lee,You,\"He said \"\"hi\"\" again\",No,,iMessage"
    );
    assert!(lines[3].ends_with(",Yes,Book Club,iMessage"));
}

#[test]
fn test_missing_store_is_unavailable() {
    let missing = Path::new("/nonexistent/chat.db");
    assert!(matches!(open_db(missing), Err(Error::StoreUnavailable { .. })));
}
