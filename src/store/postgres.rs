use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Row};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{QueryOutput, StoreClient};
use crate::style::Credentials;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// PostGIS store with one lazily created pool per distinct set of credentials.
pub struct PgStore {
    max_connections: u32,
    pools: Mutex<HashMap<Credentials, PgPool>>,
}

impl PgStore {
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections: max_connections.max(1),
            pools: Mutex::new(HashMap::new()),
        }
    }

    async fn pool(&self, credentials: &Credentials) -> PgPool {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(credentials) {
            return pool.clone();
        }
        tracing::debug!(
            host = credentials.host.as_deref().unwrap_or("<env>"),
            dbname = credentials.dbname.as_deref().unwrap_or("<env>"),
            "creating connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_lazy_with(connect_options(credentials));
        pools.insert(credentials.clone(), pool.clone());
        pool
    }
}

impl Default for PgStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

/// Starts from the libpq environment (`PGHOST`, `PGUSER`, ...) and overrides
/// whatever the datasource specifies.
pub fn connect_options(credentials: &Credentials) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();
    if let Some(host) = credentials.host.as_deref() {
        options = options.host(host);
    }
    if let Some(port) = credentials.port {
        options = options.port(port);
    }
    if let Some(user) = credentials.user.as_deref() {
        options = options.username(user);
    }
    if let Some(password) = credentials.password.as_deref() {
        options = options.password(password);
    }
    if let Some(dbname) = credentials.dbname.as_deref() {
        options = options.database(dbname);
    }
    options
}

#[async_trait]
impl StoreClient for PgStore {
    type Connection = PoolConnection<Postgres>;

    async fn connect(&self, credentials: &Credentials) -> Result<Self::Connection, StoreError> {
        let pool = self.pool(credentials).await;
        Ok(pool.acquire().await?)
    }

    async fn execute(
        &self,
        connection: &mut Self::Connection,
        query: &str,
    ) -> Result<QueryOutput, StoreError> {
        let rows = sqlx::query(query).fetch_all(&mut **connection).await?;
        let geometries = rows
            .iter()
            .map(|row| {
                if row.is_empty() {
                    return Ok(None);
                }
                row.try_get::<Option<Vec<u8>>, _>(row.len() - 1)
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(QueryOutput {
            row_count: rows.len() as u64,
            geometries,
        })
    }

    fn release(&self, connection: Self::Connection) {
        drop(connection);
    }

    async fn shutdown(&self) {
        let pools: Vec<PgPool> = self.pools.lock().await.drain().map(|(_, pool)| pool).collect();
        for pool in pools {
            pool.close().await;
        }
    }
}
