//! SQLite connection handle and migration ledger for the bookshelf service.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// Shared handle to the SQLite database.
///
/// The connection sits behind a mutex; every call that touches it should go
/// through [`Database::call`] so the blocking work runs off the async
/// executor.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database file at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;

        tracing::info!(target: "bookshelf-db", path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS schema_migrations (
                module     TEXT NOT NULL,
                id         TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (module, id)
            );
            "#,
        )
        .context("failed to initialize migration ledger")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread pool.
    pub async fn call<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .context("database task panicked")?
    }

    /// Apply a migration unless the ledger already records it.
    ///
    /// Returns `true` when the migration ran. The script and its ledger entry
    /// are committed in one transaction.
    pub async fn apply_migration(&self, module: &str, id: &str, up: &str) -> anyhow::Result<bool> {
        let (module, id, up) = (module.to_string(), id.to_string(), up.to_string());

        self.call(move |conn| {
            let applied = conn
                .query_row(
                    "SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2",
                    params![module, id],
                    |_| Ok(()),
                )
                .optional()
                .context("failed to read migration ledger")?
                .is_some();

            if applied {
                tracing::debug!(target: "bookshelf-db", %module, %id, "migration already applied");
                return Ok(false);
            }

            let tx = conn
                .unchecked_transaction()
                .context("failed to begin migration transaction")?;
            tx.execute_batch(&up)
                .with_context(|| format!("migration {module}/{id} failed"))?;
            tx.execute(
                "INSERT INTO schema_migrations (module, id) VALUES (?1, ?2)",
                params![module, id],
            )
            .context("failed to record migration")?;
            tx.commit().context("failed to commit migration")?;

            tracing::info!(target: "bookshelf-db", %module, %id, "migration applied");
            Ok(true)
        })
        .await
    }

    /// List applied migrations as `(module, id)` pairs in application order.
    pub async fn applied_migrations(&self) -> anyhow::Result<Vec<(String, String)>> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare("SELECT module, id FROM schema_migrations ORDER BY rowid")
                .context("failed to prepare migration query")?;

            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .context("failed to query migrations")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect migrations")?;

            Ok(rows)
        })
        .await
    }
}
