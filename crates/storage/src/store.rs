//! SQLite record store implementation.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{Error, Record, RecordId, RecordKind, Result};

/// SQLite-backed store of caller-owned records.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open or create a record store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory record store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                done INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_owner_kind
                ON records(owner, kind, created_at);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new record.
    pub fn create(&self, record: &Record) -> Result<()> {
        self.conn.execute(
            "INSERT INTO records (id, owner, kind, title, body, done, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.owner,
                record.kind.as_str(),
                record.title,
                serde_json::to_string(&record.body)?,
                record.done as i64,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a record, enforcing ownership.
    pub fn get(&self, owner: &str, id: RecordId) -> Result<Record> {
        let row = self
            .conn
            .prepare(
                "SELECT id, owner, kind, title, body, done, created_at, updated_at
                 FROM records WHERE id = ?1",
            )?
            .query_row([id.to_string()], read_row)
            .optional()?;

        match row {
            None => Err(Error::NotFound(id)),
            Some(raw) => {
                let record = raw.decode()?;
                if record.owner != owner {
                    return Err(Error::NotOwner(id));
                }
                Ok(record)
            }
        }
    }

    /// List a caller's records of one kind, oldest first.
    pub fn list(&self, owner: &str, kind: RecordKind) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, kind, title, body, done, created_at, updated_at
             FROM records WHERE owner = ?1 AND kind = ?2 ORDER BY created_at",
        )?;

        let mut records = Vec::new();
        for raw in stmt.query_map(params![owner, kind.as_str()], read_row)? {
            records.push(raw?.decode()?);
        }
        Ok(records)
    }

    /// Update a record's title and/or body, enforcing ownership.
    pub fn update(
        &self,
        owner: &str,
        id: RecordId,
        title: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<Record> {
        let mut record = self.get(owner, id)?;
        if let Some(title) = title {
            record.title = title.to_string();
        }
        if let Some(body) = body {
            record.body = body.clone();
        }
        record.updated_at = Utc::now();

        self.conn.execute(
            "UPDATE records SET title = ?2, body = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                record.title,
                serde_json::to_string(&record.body)?,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    /// Mark a record done or not done, enforcing ownership.
    pub fn set_done(&self, owner: &str, id: RecordId, done: bool) -> Result<Record> {
        let mut record = self.get(owner, id)?;
        record.done = done;
        record.updated_at = Utc::now();

        self.conn.execute(
            "UPDATE records SET done = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                record.done as i64,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    /// Delete a record, enforcing ownership.
    pub fn delete(&self, owner: &str, id: RecordId) -> Result<()> {
        // Ownership check first so a foreign id errors rather than no-ops.
        self.get(owner, id)?;
        self.conn
            .execute("DELETE FROM records WHERE id = ?1", [id.to_string()])?;
        Ok(())
    }
}

/// A row as stored, before decoding into domain types.
struct RawRecord {
    id: String,
    owner: String,
    kind: String,
    title: String,
    body: String,
    done: i64,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        done: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl RawRecord {
    /// Decode stored text fields; failures report the row as corrupt.
    fn decode(self) -> Result<Record> {
        let corrupt = |field: &str| Error::Corrupt(format!("bad {field}"));

        Ok(Record {
            id: self.id.parse().map_err(|_| corrupt("id"))?,
            owner: self.owner,
            kind: RecordKind::parse(&self.kind).ok_or_else(|| corrupt("kind"))?,
            title: self.title,
            body: serde_json::from_str(&self.body).map_err(|_| corrupt("body"))?,
            done: self.done != 0,
            created_at: self.created_at.parse().map_err(|_| corrupt("created_at"))?,
            updated_at: self.updated_at.parse().map_err(|_| corrupt("updated_at"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_and_list_by_owner() {
        let store = RecordStore::in_memory().unwrap();
        store
            .create(&Record::new("u1", RecordKind::Todo, "first"))
            .unwrap();
        store
            .create(&Record::new("u1", RecordKind::Todo, "second"))
            .unwrap();
        store
            .create(&Record::new("u2", RecordKind::Todo, "other caller"))
            .unwrap();
        store
            .create(&Record::new("u1", RecordKind::Project, "not a todo"))
            .unwrap();

        let todos = store.list("u1", RecordKind::Todo).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].title, "first");
    }

    #[test]
    fn get_enforces_ownership() {
        let store = RecordStore::in_memory().unwrap();
        let record = Record::new("u1", RecordKind::Todo, "mine");
        store.create(&record).unwrap();

        assert!(matches!(
            store.get("u2", record.id),
            Err(Error::NotOwner(_))
        ));
        assert!(matches!(
            store.get("u1", RecordId::new()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn update_and_complete() {
        let store = RecordStore::in_memory().unwrap();
        let record = Record::new("u1", RecordKind::Todo, "draft");
        store.create(&record).unwrap();

        let updated = store
            .update("u1", record.id, Some("final"), Some(&json!({"note": "x"})))
            .unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.body, json!({"note": "x"}));

        let done = store.set_done("u1", record.id, true).unwrap();
        assert!(done.done);
    }

    #[test]
    fn delete_checks_ownership_first() {
        let store = RecordStore::in_memory().unwrap();
        let record = Record::new("u1", RecordKind::Todo, "mine");
        store.create(&record).unwrap();

        assert!(matches!(
            store.delete("u2", record.id),
            Err(Error::NotOwner(_))
        ));
        store.delete("u1", record.id).unwrap();
        assert!(matches!(
            store.get("u1", record.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_row_reported_distinctly() {
        let store = RecordStore::in_memory().unwrap();
        let record = Record::new("u1", RecordKind::Todo, "fine");
        store.create(&record).unwrap();

        store
            .conn
            .execute(
                "UPDATE records SET body = 'not json' WHERE id = ?1",
                [record.id.to_string()],
            )
            .unwrap();

        assert!(matches!(
            store.get("u1", record.id),
            Err(Error::Corrupt(_))
        ));
        assert!(matches!(
            store.list("u1", RecordKind::Todo),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn body_round_trips() {
        let store = RecordStore::in_memory().unwrap();
        let record = Record::new("u1", RecordKind::TestCase, "case")
            .with_body(json!({"steps": ["a", "b"], "expect": 3}));
        store.create(&record).unwrap();

        let loaded = store.get("u1", record.id).unwrap();
        assert_eq!(loaded.body, json!({"steps": ["a", "b"], "expect": 3}));
    }
}
