use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, DatabaseName::Main, OptionalExtension};
use thread_local::ThreadLocal;
use tracing::debug;

use super::{Entry, KeyValueDatabaseEngine, KvTree, Result};
use crate::{config::DatabaseConfig, error, utils};

/// File name of the database inside the configured directory
const DATABASE_FILE: &str = "dashthumbs.db";

pub(crate) struct Engine {
    writer: Mutex<Connection>,
    read_conn_tls: ThreadLocal<Connection>,

    path: PathBuf,
    cache_size_per_thread: u32,
}

impl Engine {
    fn prepare_conn(path: &Path, cache_size_kb: u32) -> Result<Connection> {
        let conn = Connection::open(path)?;

        conn.pragma_update(Some(Main), "page_size", 2048)?;
        let journal_mode: String = conn.pragma_update_and_check(
            Some(Main),
            "journal_mode",
            "WAL",
            |row| row.get(0),
        )?;
        debug!(%journal_mode, "Opened sqlite connection");
        conn.pragma_update(Some(Main), "synchronous", "NORMAL")?;
        conn.pragma_update(
            Some(Main),
            "cache_size",
            -i64::from(cache_size_kb),
        )?;

        Ok(conn)
    }

    fn write_lock(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock()
    }

    fn read_lock(&self) -> Result<&Connection> {
        self.read_conn_tls.get_or_try(|| {
            Self::prepare_conn(&self.path, self.cache_size_per_thread)
        })
    }
}

impl KeyValueDatabaseEngine for Arc<Engine> {
    fn open(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path.join(DATABASE_FILE);

        // Calculates cache-size per permanent connection
        // 1. convert MB to KiB
        // 2. divide by permanent connections + permanent iter connections +
        //    write connection
        // 3. round down to nearest integer
        #[allow(
            clippy::as_conversions,
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss
        )]
        let cache_size_per_thread = ((config.cache_capacity_mb * 1024.0)
            / ((thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get)
                * 2)
                + 1) as f64) as u32;

        let writer =
            Mutex::new(Engine::prepare_conn(&path, cache_size_per_thread)?);

        Ok(Arc::new(Engine {
            writer,
            read_conn_tls: ThreadLocal::new(),
            path,
            cache_size_per_thread,
        }))
    }

    fn open_tree(&self, name: &'static str) -> Result<Arc<dyn KvTree>> {
        self.write_lock().execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {name} ( \"key\" BLOB PRIMARY KEY, \
                 \"value\" BLOB NOT NULL )"
            ),
            [],
        )?;

        Ok(Arc::new(SqliteTable {
            engine: Arc::clone(self),
            name,
        }))
    }

    fn flush(&self) -> Result<()> {
        self.write_lock().pragma_update(
            Some(Main),
            "wal_checkpoint",
            "RESTART",
        )?;
        Ok(())
    }
}

pub(crate) struct SqliteTable {
    engine: Arc<Engine>,
    name: &'static str,
}

impl SqliteTable {
    fn get_with_guard(
        &self,
        guard: &Connection,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        Ok(guard
            .prepare_cached(&format!(
                "SELECT value FROM {} WHERE key = ?",
                self.name
            ))?
            .query_row([key], |row| row.get(0))
            .optional()?)
    }

    fn insert_with_guard(
        &self,
        guard: &Connection,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        guard.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
                self.name
            ),
            params![key, value],
        )?;
        Ok(())
    }
}

impl KvTree for SqliteTable {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_with_guard(self.engine.read_lock()?, key)
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let guard = self.engine.write_lock();
        self.insert_with_guard(&guard, key, value)
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let guard = self.engine.write_lock();

        guard.execute(
            &format!("DELETE FROM {} WHERE key = ?", self.name),
            [key],
        )?;

        Ok(())
    }

    fn iter(&self) -> Result<Vec<Entry>> {
        let guard = self.engine.read_lock()?;
        let mut statement = guard.prepare_cached(&format!(
            "SELECT key, value FROM {} ORDER BY key ASC",
            self.name
        ))?;

        let entries = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        let guard = self.engine.read_lock()?;
        let mut statement = guard.prepare_cached(&format!(
            "SELECT key, value FROM {} WHERE key >= ? ORDER BY key ASC",
            self.name
        ))?;

        let mut rows = statement.query([prefix])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let key: Vec<u8> = row.get(0)?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, row.get(1)?));
        }

        Ok(entries)
    }

    fn increment(&self, key: &[u8]) -> Result<Vec<u8>> {
        let guard = self.engine.write_lock();

        let old = self.get_with_guard(&guard, key)?;
        let new = utils::increment(old.as_deref());
        self.insert_with_guard(&guard, key, &new)?;

        Ok(new)
    }

    fn count(&self) -> Result<u64> {
        let guard = self.engine.read_lock()?;
        let count: i64 = guard.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.name),
            [],
            |row| row.get(0),
        )?;

        u64::try_from(count)
            .map_err(|_| error::Database::Corrupt("negative row count"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Engine;
    use crate::{
        config::{DatabaseBackend, DatabaseConfig},
        database::abstraction::{KeyValueDatabaseEngine, KvTree},
        utils,
    };

    fn open(dir: &tempfile::TempDir) -> Arc<dyn KvTree> {
        let engine = Arc::<Engine>::open(&DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            path: dir.path().to_owned(),
            cache_capacity_mb: 8.0,
        })
        .expect("engine should open");

        engine.open_tree("test").expect("tree should open")
    }

    #[test]
    fn insert_get_remove() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let tree = open(&dir);

        tree.insert(b"hello", b"world").expect("insert should succeed");
        assert_eq!(
            tree.get(b"hello").expect("get should succeed").as_deref(),
            Some(&b"world"[..])
        );

        tree.insert(b"hello", b"again").expect("insert should succeed");
        assert_eq!(
            tree.get(b"hello").expect("get should succeed").as_deref(),
            Some(&b"again"[..])
        );
        assert_eq!(tree.count().expect("count should succeed"), 1);

        tree.remove(b"hello").expect("remove should succeed");
        assert_eq!(tree.get(b"hello").expect("get should succeed"), None);
        assert_eq!(tree.count().expect("count should succeed"), 0);
    }

    #[test]
    fn scan_prefix_stops_at_first_mismatch() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let tree = open(&dir);

        for key in [&b"a\xffz"[..], b"b\xff1", b"b\xff2", b"b", b"c\xff1"] {
            tree.insert(key, b"").expect("insert should succeed");
        }

        let keys: Vec<_> = tree
            .scan_prefix(b"b\xff")
            .expect("scan should succeed")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, [b"b\xff1".to_vec(), b"b\xff2".to_vec()]);

        let all = tree.iter().expect("iteration should succeed");
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].0, b"a\xffz");
    }

    #[test]
    fn increment_starts_at_one() {
        let dir = tempfile::tempdir().expect("should create a temp dir");
        let tree = open(&dir);

        let first = tree.increment(b"n").expect("increment should succeed");
        let second = tree.increment(b"n").expect("increment should succeed");

        assert_eq!(utils::u64_from_bytes(&first).ok(), Some(1));
        assert_eq!(utils::u64_from_bytes(&second).ok(), Some(2));
    }
}
