//! Queryable store of joined customer entities.

use crate::error::StoreError;
use async_trait::async_trait;
use model::records::customer::Customer360Entity;

pub mod postgres;
pub mod sled_store;

pub use postgres::PostgresCuratedStore;
pub use sled_store::SledCuratedStore;

/// Insert-or-replace by customer id. Concurrent upserts of one key are
/// serialized by the backend; the last committed write wins.
#[async_trait]
pub trait CuratedStore: Send + Sync {
    async fn upsert(&self, entity: &Customer360Entity) -> Result<(), StoreError>;

    async fn get(&self, customer_id: &str) -> Result<Option<Customer360Entity>, StoreError>;

    /// Every entity, ordered by customer id.
    async fn read_all(&self) -> Result<Vec<Customer360Entity>, StoreError>;
}
