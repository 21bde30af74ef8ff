//! Durable record of which submission currently owns each applied image.
//!
//! One SQLite database per destination service (Plex and Jellyfin never
//! consult each other's provenance). Keyed by (object id, file type), one
//! row per slot, replace-on-write — this is a mapping, not a history log.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ServiceError;
use crate::sets::FileType;

/// Provenance of the image currently applied to one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceRecord {
    pub creator: String,
    pub set_id: i64,
    pub last_updated: DateTime<Utc>,
}

pub struct ProvenanceCache {
    conn: Connection,
}

impl ProvenanceCache {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, ServiceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Per-service database below the cache root, e.g. `jellyfin.sqlite`.
    pub fn for_service(cache_root: &Path, service: &str) -> Result<Self, ServiceError> {
        Self::open(&cache_root.join(format!("{service}.sqlite")))
    }

    /// In-memory database, handy for tests.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ServiceError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                id TEXT NOT NULL,
                type TEXT NOT NULL,
                creator TEXT NOT NULL,
                set_id INTEGER NOT NULL,
                last_updated TIMESTAMP NOT NULL,
                PRIMARY KEY (id, type)
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn select(
        &self,
        object_id: &str,
        file_type: FileType,
    ) -> Result<Option<ProvenanceRecord>, ServiceError> {
        let row = self
            .conn
            .query_row(
                "SELECT creator, set_id, last_updated FROM cache WHERE id = ?1 AND type = ?2",
                params![object_id, file_type.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((creator, set_id, stamp)) => {
                let last_updated = DateTime::parse_from_rfc3339(&stamp)
                    .map_err(|err| {
                        ServiceError::Validation(format!("bad cache timestamp '{stamp}': {err}"))
                    })?
                    .with_timezone(&Utc);
                Ok(Some(ProvenanceRecord {
                    creator,
                    set_id,
                    last_updated,
                }))
            }
        }
    }

    /// Insert or replace the record for a slot. Last writer wins.
    pub fn insert(
        &self,
        object_id: &str,
        file_type: FileType,
        creator: &str,
        set_id: i64,
        last_updated: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cache (id, type, creator, set_id, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                object_id,
                file_type.as_str(),
                creator,
                set_id,
                last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, object_id: &str, file_type: FileType) -> Result<(), ServiceError> {
        self.conn.execute(
            "DELETE FROM cache WHERE id = ?1 AND type = ?2",
            params![object_id, file_type.as_str()],
        )?;
        Ok(())
    }
}
