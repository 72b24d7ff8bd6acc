use anyhow::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use r2d2_sqlite::rusqlite::{self, params, OpenFlags, OptionalExtension};

use crate::storage::area::StorageArea;

/// SQLite-backed persistent local storage for a single origin.
pub struct SqliteArea {
    pool: Pool<SqliteConnectionManager>,
    origin: String,
}

impl SqliteArea {
    /// Opens (or creates) the database at `path` and binds the area to `origin`.
    pub fn new(path: &str, origin: &url::Origin) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
            .with_init(|c| {
                c.busy_timeout(std::time::Duration::from_millis(500))?;
                c.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS local_storage (
                        origin TEXT NOT NULL,
                        key TEXT NOT NULL,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
                        PRIMARY KEY(origin, key)
                    );"
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(manager)?;

        log::debug!("Opened sqlite local storage at {} for {}", path, origin.ascii_serialization());

        Ok(Self {
            pool,
            origin: origin.ascii_serialization(),
        })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn try_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                params![self.origin, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn try_len(&self) -> Result<usize> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM local_storage WHERE origin = ?1",
            params![self.origin],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n)?)
    }

    fn try_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM local_storage WHERE origin = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.origin], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<()> {
        self.conn()?.execute(sql, params)?;
        Ok(())
    }
}

/// Reads cannot report errors through [`StorageArea`]; they are logged and read as empty.
fn or_empty<T: Default>(res: Result<T>, what: &str) -> T {
    res.unwrap_or_else(|e| {
        log::warn!("sqlite local storage: {} failed: {}", what, e);
        T::default()
    })
}

impl StorageArea for SqliteArea {
    fn get_item(&self, key: &str) -> Option<String> {
        or_empty(self.try_get(key), "get")
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.execute(
            "INSERT INTO local_storage (origin, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (origin, key) DO UPDATE
             SET value = excluded.value, updated_at = strftime('%s', 'now')",
            params![self.origin, key, value],
        )
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.execute(
            "DELETE FROM local_storage WHERE origin = ?1 AND key = ?2",
            params![self.origin, key],
        )
    }

    fn clear(&self) -> Result<()> {
        self.execute("DELETE FROM local_storage WHERE origin = ?1", params![self.origin])
    }

    fn len(&self) -> usize {
        or_empty(self.try_len(), "count")
    }

    fn keys(&self) -> Vec<String> {
        or_empty(self.try_keys(), "keys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn o(s: &str) -> url::Origin {
        url::Url::parse(s).expect("valid URL").origin()
    }

    fn db_path(dir: &tempfile::TempDir) -> String {
        dir.path().join("local.db").to_string_lossy().into_owned()
    }

    #[test]
    fn area_contract() {
        let dir = tempfile::tempdir().unwrap();
        let area = SqliteArea::new(&db_path(&dir), &o("https://example.com")).unwrap();

        assert_eq!(area.len(), 0);
        assert!(area.get_item("missing").is_none());

        area.set_item("b", "2").unwrap();
        area.set_item("a", "1").unwrap();
        area.set_item("a", "ONE").unwrap();
        assert_eq!(area.len(), 2);
        assert_eq!(area.get_item("a").as_deref(), Some("ONE"));
        assert_eq!(area.keys(), vec!["a", "b"]);

        area.remove_item("b").unwrap();
        assert!(area.get_item("b").is_none());

        area.clear().unwrap();
        assert!(area.is_empty());
    }

    #[test]
    fn values_survive_reopen_and_origins_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = db_path(&dir);

        {
            let area = SqliteArea::new(&path, &o("https://a.test")).unwrap();
            area.set_item("k", "v").unwrap();
        }

        let reopened = SqliteArea::new(&path, &o("https://a.test")).unwrap();
        assert_eq!(reopened.get_item("k").as_deref(), Some("v"));

        let other = SqliteArea::new(&path, &o("https://b.test")).unwrap();
        assert!(other.get_item("k").is_none());
        other.clear().unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
