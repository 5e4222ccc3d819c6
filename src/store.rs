pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::style::Credentials;

pub use self::postgres::PgStore;

/// Rows returned by a profiled query. Only the trailing `geom` column is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub row_count: u64,
    pub geometries: Vec<Option<Vec<u8>>>,
}

/// Access to the backing data store.
///
/// Connections come from a process wide pool. Every connection handed out by
/// [`StoreClient::connect`] is given back through [`StoreClient::release`]
/// before the next one is requested.
#[async_trait]
pub trait StoreClient: Send + Sync {
    type Connection: Send;

    async fn connect(&self, credentials: &Credentials) -> Result<Self::Connection, StoreError>;

    async fn execute(
        &self,
        connection: &mut Self::Connection,
        query: &str,
    ) -> Result<QueryOutput, StoreError>;

    fn release(&self, connection: Self::Connection);

    /// Closes every pooled connection.
    async fn shutdown(&self);
}
