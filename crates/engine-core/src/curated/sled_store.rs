use super::CuratedStore;
use crate::error::StoreError;
use async_trait::async_trait;
use model::records::customer::Customer360Entity;

const CUSTOMERS_TREE: &str = "customer_360";

/// Curated store for local runs, one sled entry per customer.
#[derive(Debug, Clone)]
pub struct SledCuratedStore {
    tree: sled::Tree,
}

impl SledCuratedStore {
    pub fn from_db(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree(CUSTOMERS_TREE)?,
        })
    }
}

#[async_trait]
impl CuratedStore for SledCuratedStore {
    async fn upsert(&self, entity: &Customer360Entity) -> Result<(), StoreError> {
        let bytes = bincode::serialize(entity)?;
        self.tree.insert(entity.customer_id.as_bytes(), bytes)?;
        self.tree.flush_async().await?;
        Ok(())
    }

    async fn get(&self, customer_id: &str) -> Result<Option<Customer360Entity>, StoreError> {
        match self.tree.get(customer_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_all(&self) -> Result<Vec<Customer360Entity>, StoreError> {
        self.tree
            .iter()
            .map(|item| {
                let (_, bytes) = item?;
                Ok(bincode::deserialize(&bytes)?)
            })
            .collect()
    }
}
