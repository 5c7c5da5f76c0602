//! SQLite pool setup for the publishing store.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Schema migrations from `crates/store/migrations`, applied on every connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database connection pool for the publishing store.
///
/// Articles, media metadata, share events and video task bookkeeping all
/// live in the one SQLite file. Hand a [`Repository`](crate::Repository)
/// out of this rather than passing the pool around.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Applies the query-based PRAGMAs to every pooled connection,
            // not only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database at the given path with the default pool size.
    ///
    /// The file is created on first use; pending migrations run before this returns.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect to the database at the given path, capping the pool at
    /// `max_connections`.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn connect_with(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, max_connections.max(1)).await
    }

    /// Connect to an in-memory database.
    ///
    /// Not gated behind `#[cfg(test)]` so that other crates can use it in
    /// their own tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every connection to `:memory:` gets its own database unless the
        // pool is limited to a single connection.
        Self::new(options, 1).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Media rows cascade to article_media and video_task.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Background share writes compete with request writes for the
            // single WAL writer.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Per-connection PRAGMAs that `SqliteConnectOptions` has no setter for.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// The shared pool. Every [`Repository`](crate::Repository) clones it.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// Waits for all connections to be returned to the pool and then closes
    /// them. Any later query fails with [`ErrorKind::Database`].
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
