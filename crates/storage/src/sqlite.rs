//! SQLite-backed ordered store.
//!
//! All tables share one physical `kv_records` table keyed by
//! `(table_name, key)`, so table names never reach SQL text. The store owns a
//! small tokio runtime and blocks on it, which keeps the [`OrderedStore`]
//! contract synchronous for the drain thread.

use std::collections::VecDeque;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::runtime::Runtime;

use crate::store::{OrderedStore, StoreError, StoreIter};

const SCAN_PAGE: i64 = 256;

/// SQLite ordered store.
#[derive(Debug)]
pub struct SqliteStore {
    runtime: Runtime,
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database at `url`, e.g. `sqlite:///var/lib/sspr/queue.db?mode=rwc`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("sspr-sqlite")
            .enable_all()
            .build()
            .map_err(|e| StoreError::unavailable(format!("failed to build runtime: {e}")))?;

        let pool = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .map_err(|e| StoreError::unavailable(format!("failed to open {url}: {e}")))?;

            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS kv_records (
                    table_name  TEXT NOT NULL,
                    key         TEXT NOT NULL,
                    value       BLOB NOT NULL,
                    PRIMARY KEY (table_name, key)
                )
                "#,
            )
            .execute(&pool)
            .await
            .map_err(unavailable)?;

            Ok::<SqlitePool, StoreError>(pool)
        })?;

        Ok(Self { runtime, pool })
    }

    /// Private in-memory database; contents vanish with the store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:")
    }

    fn page_after(
        &self,
        table: &str,
        after: &str,
    ) -> Result<VecDeque<(String, Vec<u8>)>, StoreError> {
        self.runtime.block_on(async {
            let rows = sqlx::query(
                r#"
                SELECT key, value
                FROM kv_records
                WHERE table_name = ?1 AND key > ?2
                ORDER BY key ASC
                LIMIT ?3
                "#,
            )
            .bind(table)
            .bind(after)
            .bind(SCAN_PAGE)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

            rows.into_iter()
                .map(|row| {
                    let key: String = row.try_get("key").map_err(unavailable)?;
                    let value: Vec<u8> = row.try_get("value").map_err(unavailable)?;
                    Ok::<_, StoreError>((key, value))
                })
                .collect::<Result<VecDeque<_>, StoreError>>()
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::unavailable(e.to_string())
}

impl OrderedStore for SqliteStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.runtime.block_on(async {
            let row = sqlx::query("SELECT value FROM kv_records WHERE table_name = ?1 AND key = ?2")
                .bind(table)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

            match row {
                Some(row) => {
                    let value = row.try_get::<Vec<u8>, _>("value").map_err(unavailable)?;
                    Ok::<_, StoreError>(Some(value))
                }
                None => Ok(None),
            }
        })
    }

    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let existed = self.contains(table, key)?;
        self.runtime.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO kv_records (table_name, key, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (table_name, key)
                DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(table)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(unavailable)
        })?;
        Ok(existed)
    }

    fn remove(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        let result = self.runtime.block_on(async {
            sqlx::query("DELETE FROM kv_records WHERE table_name = ?1 AND key = ?2")
                .bind(table)
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(unavailable)
        })?;
        Ok(result.rows_affected() > 0)
    }

    fn size(&self, table: &str) -> Result<usize, StoreError> {
        let count: i64 = self.runtime.block_on(async {
            sqlx::query("SELECT COUNT(*) AS n FROM kv_records WHERE table_name = ?1")
                .bind(table)
                .fetch_one(&self.pool)
                .await
                .and_then(|row| row.try_get::<i64, _>("n"))
                .map_err(unavailable)
        })?;
        Ok(count.max(0) as usize)
    }

    fn iter<'a>(&'a self, table: &str) -> StoreIter<'a> {
        Box::new(SqliteScan {
            store: self,
            table: table.to_string(),
            buffer: VecDeque::new(),
            last: String::new(),
            exhausted: false,
        })
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            sqlx::query("DELETE FROM kv_records WHERE table_name = ?1")
                .bind(table)
                .execute(&self.pool)
                .await
                .map_err(unavailable)
        })?;
        Ok(())
    }
}

/// Keyset-paginated scan; keys must be non-empty.
struct SqliteScan<'a> {
    store: &'a SqliteStore,
    table: String,
    buffer: VecDeque<(String, Vec<u8>)>,
    last: String,
    exhausted: bool,
}

impl Iterator for SqliteScan<'_> {
    type Item = Result<(String, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.store.page_after(&self.table, &self.last) {
                Ok(page) => {
                    self.exhausted = (page.len() as i64) < SCAN_PAGE;
                    self.buffer = page;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        let (key, value) = self.buffer.pop_front()?;
        self.last = key.clone();
        Some(Ok((key, value)))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Close on our own runtime so the database file is released before the
        // runtime shuts down.
        self.runtime.block_on(self.pool.close());
    }
}
