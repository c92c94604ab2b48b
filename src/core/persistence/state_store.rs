// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque key-value storage contract for durable counter state.
//!
//! The counting core only ever sees `get`/`put` of byte blobs; which
//! backend actually holds them is the host's choice.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Storage collaborator for persisted snapshots.
pub trait StateStore: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), BoxError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError>;
}

/// Very small in-memory implementation useful for tests.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }
}

/// File-based store keeping each key as a file under a base directory.
pub struct FileStateStore {
    base: PathBuf,
}

impl FileStateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> std::io::Result<Self> {
        let base = path.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base.join(key)
    }
}

impl StateStore for FileStateStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), BoxError> {
        fs::write(self.file_path(key), value)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        match fs::read(self.file_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// SQLite-backed store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (key TEXT PRIMARY KEY, value BLOB)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StateStore for SqliteStateStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO state(key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row("SELECT value FROM state WHERE key=?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}
