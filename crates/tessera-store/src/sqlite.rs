//! SQLite implementation of the store traits.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Live subscriptions are fanned
//! out in-process; peers replicating into the same file are out of scope.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use tessera_core::now_secs;

use crate::error::{poisoned, Result, StoreError};
use crate::migration;
use crate::subscription::{Hub, Rescan, Subscription};
use crate::traits::{BlobStore, GraphStore, Member, PutResult, SetResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    hub: Arc<Mutex<Hub>>,
    closed: Arc<AtomicBool>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hub: Arc::new(Mutex::new(Hub::default())),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(self.conn.clone(), &self.closed, f).await
    }

    /// Re-read `collection` on the blocking pool when a subscriber lags.
    fn rescan(&self, collection: &str) -> Rescan {
        let conn = self.conn.clone();
        let closed = self.closed.clone();
        let collection = collection.to_string();
        Arc::new(move || {
            let conn = conn.clone();
            let closed = closed.clone();
            let collection = collection.clone();
            Box::pin(async move {
                run_blocking(conn, &closed, move |conn| select_members(conn, &collection)).await
            })
        })
    }
}

async fn run_blocking<F, T>(conn: Arc<Mutex<Connection>>, closed: &AtomicBool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    if closed.load(Ordering::Acquire) {
        return Err(StoreError::Closed);
    }
    tokio::task::spawn_blocking(move || {
        let mut conn = conn.lock().map_err(poisoned)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
}

fn select_members(conn: &Connection, collection: &str) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare_cached(
        "SELECT member_key, value FROM set_members WHERE collection = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![collection], |row| {
        Ok(Member {
            key: row.get(0)?,
            value: Bytes::from(row.get::<_, Vec<u8>>(1)?),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[async_trait]
impl GraphStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM nodes WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<PutResult> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_conn(move |conn| {
            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM nodes WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            let result = match existing {
                Some(bytes) if bytes == value => return Ok(PutResult::AlreadyExists),
                Some(_) => PutResult::Replaced,
                None => PutResult::Inserted,
            };

            conn.execute(
                "INSERT INTO nodes (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now_secs()],
            )?;
            debug!(key = %key, ?result, "put node");
            Ok(result)
        })
        .await
    }

    async fn set(&self, collection: &str, value: &[u8]) -> Result<SetResult> {
        let member = Member::new(Bytes::copy_from_slice(value));
        let key = member.key.clone();
        let coll = collection.to_string();
        let value = value.to_vec();

        let inserted = self
            .with_conn(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO set_members (collection, member_key, value, added_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![coll, key, value, now_secs()],
                )?;
                Ok(changed > 0)
            })
            .await?;

        if inserted {
            self.hub.lock().map_err(poisoned)?.publish(collection, &member);
            debug!(collection, key = %member.key, "added member");
        }

        Ok(SetResult {
            key: member.key,
            inserted,
        })
    }

    async fn members(&self, collection: &str) -> Result<Vec<Member>> {
        let collection = collection.to_string();
        self.with_conn(move |conn| select_members(conn, &collection))
            .await
    }

    async fn subscribe(&self, collection: &str) -> Result<Subscription> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        // Live first, snapshot second; the subscription dedupes the overlap.
        let live = self.hub.lock().map_err(poisoned)?.receiver(collection);
        let snapshot = self.members(collection).await?;
        Ok(Subscription::new(collection, snapshot, live).with_rescan(self.rescan(collection)))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.hub.lock().map_err(poisoned)?.close();
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn get_blob(&self, name: &str) -> Result<Option<Bytes>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM blobs WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn put_blob(&self, name: &str, value: &[u8]) -> Result<()> {
        let name = name.to_string();
        let value = value.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO blobs (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![name, value, now_secs()],
            )?;
            Ok(())
        })
        .await
    }
}
