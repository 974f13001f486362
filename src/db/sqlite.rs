//! SQLite-backed product store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::db::ProductRepository;
use crate::error::{CatalogError, Result};
use crate::models::{seed_products, Product, SEED_COUNT};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL
);
"#;

const SQL_INSERT_PRODUCT: &str = "INSERT INTO products (id, name, price) VALUES (?1, ?2, ?3)";

const SQL_SELECT_ALL: &str = "SELECT id, name, price FROM products ORDER BY id";

/// Product store over a single SQLite connection.
///
/// The connection is shared behind a mutex; queries run on tokio's blocking
/// pool so they never stall the async workers.
#[derive(Clone)]
pub struct SqliteProductStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteProductStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProductStore").finish_non_exhaustive()
    }
}

impl SqliteProductStore {
    /// Open or create the database at `path`, seeding it if empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database, seeded.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let seeded = seed_if_empty(&mut conn)?;
        if seeded > 0 {
            info!("Seeded product store with {} products", seeded);
        } else {
            debug!("Product store already seeded");
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored products.
    pub async fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
        })
        .await
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| CatalogError::StorageUnavailable("connection lock poisoned".into()))?;
            f(&conn)
        })
        .await
        .map_err(|e| CatalogError::StorageUnavailable(format!("task join failed: {e}")))?
    }
}

#[async_trait]
impl ProductRepository for SqliteProductStore {
    async fn load_all(&self) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SQL_SELECT_ALL)?;
            let rows = stmt.query_map([], |row| {
                Ok(Product {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

/// Inserts the seed set when the table is empty. Returns rows inserted.
fn seed_if_empty(conn: &mut Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(SQL_INSERT_PRODUCT)?;
        for product in seed_products(SEED_COUNT) {
            stmt.execute(params![product.id, product.name, product.price])?;
        }
    }
    tx.commit()?;
    Ok(SEED_COUNT as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_determinism() {
        let store = SqliteProductStore::open_in_memory().unwrap();
        let products = store.load_all().await.unwrap();

        assert_eq!(products.len(), 10_000);
        for (i, product) in products.iter().enumerate() {
            let id = i as i64 + 1;
            assert_eq!(product.id, id);
            assert_eq!(product.name, format!("Product #{}", id));
            assert_eq!(product.price, id * 1000);
        }
    }

    #[tokio::test]
    async fn test_reopen_does_not_reseed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        let first = SqliteProductStore::open(&path).unwrap();
        assert_eq!(first.count().await.unwrap(), 10_000);
        drop(first);

        let second = SqliteProductStore::open(&path).unwrap();
        assert_eq!(second.count().await.unwrap(), 10_000);
        assert_eq!(second.load_all().await.unwrap()[0], Product::seeded(1));
    }

    #[tokio::test]
    async fn test_missing_table_is_storage_unavailable() {
        let store = SqliteProductStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE products")?))
            .await
            .unwrap();

        let err = store.load_all().await.unwrap_err();
        assert!(matches!(err, CatalogError::StorageUnavailable(_)));
    }

    #[test]
    fn test_open_unreachable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("catalog.db");

        let err = SqliteProductStore::open(&path).unwrap_err();
        assert!(matches!(err, CatalogError::StorageUnavailable(_)));
    }
}
