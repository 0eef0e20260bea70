pub mod models;
pub mod schema;

use anyhow::{anyhow, Context, Result};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::error::WebError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub fn establish(database_url: &str, pool_size: u32) -> Result<Database> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(ConnectionOptions))
            .build(manager)
            .with_context(|| format!("Failed to open database {database_url}"))?;

        let mut conn = pool.get().context("Failed to acquire a migration connection")?;
        let applied = conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
        info!(applied = applied.len(), "Database ready at {database_url}");

        Ok(Database { pool })
    }

    /// A single in-memory connection, so every checkout sees the same data.
    #[cfg(test)]
    pub fn in_memory() -> Database {
        Database::establish(":memory:", 1).expect("in-memory database")
    }

    pub fn connection(&self) -> Result<DbConnection, WebError> {
        Ok(self.pool.get()?)
    }
}
