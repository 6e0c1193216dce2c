use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub const DB_FILE_NAME: &str = "school.sqlite3";

pub const STUDENTS_KEY: &str = "students";
pub const FACULTY_KEY: &str = "faculty";
pub const MARKS_KEY: &str = "marksRecords";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // One row per collection; the payload is the whole JSON array.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots(
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Loads a collection snapshot. A missing row is an empty collection.
pub fn snapshot_load<T: DeserializeOwned>(conn: &Connection, key: &str) -> anyhow::Result<Vec<T>> {
    let payload: Option<String> = conn
        .query_row("SELECT payload FROM snapshots WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read snapshot {key}"))?;
    let Some(payload) = payload else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&payload).with_context(|| format!("snapshot {key} is not valid"))
}

pub fn snapshot_payload<T: Serialize>(key: &str, items: &[T]) -> anyhow::Result<String> {
    serde_json::to_string(items).with_context(|| format!("failed to serialize {key}"))
}

/// Replaces a collection snapshot in a single statement inside a transaction,
/// so a reader sees either the old array or the new one.
pub fn snapshot_save<T: Serialize>(conn: &Connection, key: &str, items: &[T]) -> anyhow::Result<()> {
    let payload = snapshot_payload(key, items)?;
    snapshot_save_many(conn, &[(key, payload)])
}

/// Writes several snapshots in one transaction. Either every row changes or
/// none does.
pub fn snapshot_save_many(conn: &Connection, payloads: &[(&str, String)]) -> anyhow::Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin snapshot transaction")?;
    let now = chrono::Utc::now().to_rfc3339();
    for (key, payload) in payloads {
        tx.execute(
            "INSERT INTO snapshots(key, payload, updated_at) VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            (*key, payload.as_str(), now.as_str()),
        )
        .with_context(|| format!("failed to write snapshot {key}"))?;
    }
    tx.commit().context("failed to commit snapshot")?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_loads_empty() {
        let conn = open_in_memory();
        let items: Vec<String> = snapshot_load(&conn, "nothing").expect("load");
        assert!(items.is_empty());
    }

    #[test]
    fn snapshot_save_overwrites_whole_array() {
        let conn = open_in_memory();
        snapshot_save(&conn, "k", &["a".to_string(), "b".to_string()]).expect("save 1");
        snapshot_save(&conn, "k", &["c".to_string()]).expect("save 2");
        let items: Vec<String> = snapshot_load(&conn, "k").expect("load");
        assert_eq!(items, vec!["c".to_string()]);
    }

    #[test]
    fn snapshot_save_many_is_all_or_nothing() {
        let conn = open_in_memory();
        snapshot_save(&conn, "a", &["old-a".to_string()]).expect("seed a");
        conn.execute_batch(
            "CREATE TRIGGER block_b BEFORE INSERT ON snapshots WHEN NEW.key = 'b'
             BEGIN SELECT RAISE(ABORT, 'b is read-only'); END;",
        )
        .expect("trigger");

        let payloads = [
            ("a", snapshot_payload("a", &["new-a".to_string()]).expect("payload a")),
            ("b", snapshot_payload("b", &["new-b".to_string()]).expect("payload b")),
        ];
        assert!(snapshot_save_many(&conn, &payloads).is_err());

        let a: Vec<String> = snapshot_load(&conn, "a").expect("load a");
        assert_eq!(a, vec!["old-a".to_string()]);
        let b: Vec<String> = snapshot_load(&conn, "b").expect("load b");
        assert!(b.is_empty());
    }

    #[test]
    fn settings_roundtrip() {
        let conn = open_in_memory();
        assert!(settings_get_json(&conn, "x").expect("get").is_none());
        settings_set_json(&conn, "x", &serde_json::json!({ "n": 1 })).expect("set");
        assert_eq!(
            settings_get_json(&conn, "x").expect("get"),
            Some(serde_json::json!({ "n": 1 }))
        );
    }
}
