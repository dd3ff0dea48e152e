//! Connection pool handle.
//!
//! A [`Db`] is built once at startup with [`Db::connect`], which also applies
//! pending migrations, and is handed to whatever needs it. [`Db::close`]
//! drains the pool on shutdown. Request handlers never touch the pool
//! directly; they take a [`DbSession`](crate::extract::DbSession) instead.

use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    Statement, TransactionTrait,
};

#[derive(Clone, Debug)]
pub struct Db {
    conn: DatabaseConnection,
}

impl Db {
    /// Connects and applies pending migrations. In-memory URLs are pinned to
    /// a single connection since every SQLite in-memory connection is its own
    /// database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbErr> {
        let in_memory = is_in_memory(database_url);
        let mut opts = ConnectOptions::new(database_url);
        opts.connect_timeout(Duration::from_secs(10)).sqlx_logging(false);
        if in_memory {
            opts.max_connections(1).min_connections(1);
        } else {
            opts.max_connections(max_connections);
        }
        Self::open(opts, !in_memory).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, DbErr> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn open(opts: ConnectOptions, tune: bool) -> Result<Self, DbErr> {
        let conn = Database::connect(opts).await?;

        if tune {
            for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
                conn.execute(Statement::from_string(conn.get_database_backend(), pragma.to_string()))
                    .await?;
            }
        }

        Migrator::up(&conn, None).await?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Opens a read session. Dropping the returned transaction without
    /// committing rolls it back and returns the connection to the pool.
    pub async fn session(&self) -> Result<DatabaseTransaction, DbErr> {
        self.conn.begin().await
    }

    /// Drops every table and re-applies all migrations.
    pub async fn reset(&self) -> Result<(), DbErr> {
        Migrator::fresh(&self.conn).await
    }

    pub async fn close(self) -> Result<(), DbErr> {
        self.conn.close().await
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
