// src/db.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    Connection,
};
use tracing::{debug, info, instrument};

use crate::config::DbConfig;

/// Executes raw SQL text on one open connection.
#[async_trait]
pub trait SqlExecutor: Send {
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Release the connection. Called exactly once, on every exit path.
    async fn close(self) -> Result<()>
    where
        Self: Sized;

    async fn probe(&mut self) -> Result<()> {
        self.execute("SELECT 1").await
    }

    async fn begin(&mut self) -> Result<()> {
        self.execute("BEGIN").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").await
    }
}

/// Opens executors for a database configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    type Executor: SqlExecutor;

    async fn connect(&self, cfg: &DbConfig) -> Result<Self::Executor>;
}

/// Single unpooled Postgres connection per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

pub struct PgExecutor {
    conn: PgConnection,
}

/// Hosts beginning with `/` name a Unix socket directory (e.g. `/cloudsql/<instance>`).
pub fn connect_options(cfg: &DbConfig) -> PgConnectOptions {
    let opts = PgConnectOptions::new()
        .port(cfg.port)
        .database(&cfg.name)
        .username(&cfg.user)
        .password(&cfg.password)
        .application_name("olist-ingest");
    if cfg.host.starts_with('/') {
        opts.socket(&cfg.host)
    } else {
        opts.host(&cfg.host)
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Executor = PgExecutor;

    #[instrument(level = "info", skip(self, cfg), fields(host = %cfg.host, db = %cfg.name))]
    async fn connect(&self, cfg: &DbConfig) -> Result<PgExecutor> {
        let opts = connect_options(cfg);
        let conn = tokio::time::timeout(cfg.connect_timeout, PgConnection::connect_with(&opts))
            .await
            .map_err(|_| anyhow!("timed out after {:?} connecting to {}", cfg.connect_timeout, cfg.host))?
            .with_context(|| format!("connecting to {}/{}", cfg.host, cfg.name))?;
        info!("connected");
        Ok(PgExecutor { conn })
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let res = sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        debug!(rows_affected = res.rows_affected(), len = sql.len(), "executed");
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await.context("closing connection")?;
        debug!("connection closed");
        Ok(())
    }
}
