//! Embedded SQLite store.
//!
//! # Schema
//! - `item_event`: every captured item body, keyed by `(rx_time, item_id)`.
//! - `top_stories_event`: every captured top-stories snapshot.
//!
//! # Durability settings
//! Applied at open: WAL, synchronous=FULL, wal_autocheckpoint=1000, foreign_keys=ON.
//! `PRAGMA integrity_check` runs at open; returns an error if it fails.

use hn_model::{Item, ItemID, ItemUpdate, TopStories, TopStoriesUpdate};
use rusqlite::{params, Connection};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),
    #[error("decoding stored body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
}

/// The durable store. Owned exclusively by the event-log manager task;
/// never shared across tasks or threads.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`. Applies pragmas, runs
    /// `PRAGMA integrity_check`, and creates missing tables.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        run_integrity_check(&conn)?;
        apply_schema(&conn)?;
        Ok(Store { conn })
    }

    /// Distinct item IDs already captured, for rehydration.
    pub fn distinct_item_ids(&self) -> Result<Vec<ItemID>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT item_id FROM item_event")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for r in rows {
            ids.push(r?);
        }
        Ok(ids)
    }

    /// Bulk-insert a batch of item updates inside a single transaction.
    pub fn insert_item_batch(&mut self, batch: &[ItemUpdate]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO item_event (rx_time, item_id, data) VALUES (?1, ?2, ?3)",
            )?;
            for update in batch {
                stmt.execute(params![
                    update.rx_time.to_rfc3339(),
                    update.id,
                    update.data,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a single top-stories snapshot (unbatched; arrival rate is low).
    pub fn insert_top_stories(&mut self, update: &TopStoriesUpdate) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO top_stories_event (rx_time, data) VALUES (?1, ?2)",
            params![update.rx_time.to_rfc3339(), update.data],
        )?;
        Ok(())
    }

    /// Newest captured body for `id`, decoded into an [`Item`].
    pub fn get_latest_item(&self, id: ItemID) -> Result<Item, StoreError> {
        let data: Vec<u8> = self
            .conn
            .query_row(
                "SELECT data FROM item_event WHERE item_id = ?1 ORDER BY rx_time DESC LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Newest top-stories snapshot, decoded into an ordered ID sequence.
    pub fn get_top_stories(&self) -> Result<TopStories, StoreError> {
        let data: Vec<u8> = self
            .conn
            .query_row(
                "SELECT data FROM top_stories_event ORDER BY rx_time DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=FULL;
         PRAGMA wal_autocheckpoint=1000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

fn run_integrity_check(conn: &Connection) -> Result<(), StoreError> {
    let result: String = conn.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
    if result != "ok" {
        return Err(StoreError::IntegrityCheckFailed(result));
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(include_str!("schema.sql"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.sqlite3")).unwrap();
        (dir, store)
    }

    fn item_json(id: ItemID) -> Vec<u8> {
        format!(r#"{{"id":{id},"type":"story","time":1700000000}}"#).into_bytes()
    }

    #[test]
    fn rehydration_sees_only_distinct_item_ids() {
        let (_dir, mut store) = open_tmp();
        store
            .insert_item_batch(&[
                ItemUpdate { rx_time: Utc::now(), id: 2, data: item_json(2) },
                ItemUpdate { rx_time: Utc::now(), id: 4, data: item_json(4) },
            ])
            .unwrap();
        let mut ids = store.distinct_item_ids().unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn s3_duplicate_capture_newest_wins() {
        let (_dir, mut store) = open_tmp();
        let older = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let newer = chrono::DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store
            .insert_item_batch(&[ItemUpdate { rx_time: older, id: 7, data: item_json(7) }])
            .unwrap();
        let mut newer_data = item_json(7);
        newer_data.extend_from_slice(b" "); // distinguish bytes, still valid JSON trailing ws
        store
            .insert_item_batch(&[ItemUpdate { rx_time: newer, id: 7, data: newer_data.clone() }])
            .unwrap();

        let rows: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM item_event WHERE item_id = 7", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);

        let latest = store.get_latest_item(7).unwrap();
        assert_eq!(latest.id, 7);
    }

    #[test]
    fn get_latest_item_not_found() {
        let (_dir, store) = open_tmp();
        assert!(matches!(store.get_latest_item(1), Err(StoreError::NotFound)));
    }

    #[test]
    fn get_top_stories_not_found_until_written() {
        let (_dir, mut store) = open_tmp();
        assert!(matches!(store.get_top_stories(), Err(StoreError::NotFound)));
        store
            .insert_top_stories(&TopStoriesUpdate {
                rx_time: Utc::now(),
                data: b"[1,2,3]".to_vec(),
            })
            .unwrap();
        assert_eq!(store.get_top_stories().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn reopening_existing_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let mut store = Store::open(&path).unwrap();
            store
                .insert_item_batch(&[ItemUpdate { rx_time: Utc::now(), id: 1, data: item_json(1) }])
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.distinct_item_ids().unwrap(), vec![1]);
    }
}
