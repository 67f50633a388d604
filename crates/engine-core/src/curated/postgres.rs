use super::CuratedStore;
use crate::error::StoreError;
use async_trait::async_trait;
use connectors::postgres::connect_client;
use model::{
    core::identifiers::BatchId,
    records::customer::{Customer360Entity, FeedbackEntry},
};
use tokio_postgres::{Client, Row, types::Json};
use tracing::info;

pub const DEFAULT_TABLE: &str = "customer_360";

/// Curated store on PostgreSQL. Upserts use `ON CONFLICT DO UPDATE`, so the
/// row lock taken by the statement orders concurrent writers.
pub struct PostgresCuratedStore {
    client: Client,
    table: String,
    upsert_sql: String,
}

impl PostgresCuratedStore {
    pub async fn connect(url: &str, table: &str) -> Result<Self, StoreError> {
        if !is_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        let client = connect_client(url).await?;
        let store = Self {
            client,
            table: table.to_string(),
            upsert_sql: upsert_sql(table),
        };
        store.ensure_table().await?;
        info!(table, "Connected curated store");
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                customer_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                city TEXT NOT NULL,
                total_spend DOUBLE PRECISION NOT NULL,
                purchase_count BIGINT NOT NULL,
                last_purchase_date DATE,
                avg_rating DOUBLE PRECISION,
                feedback_count BIGINT NOT NULL,
                feedback JSONB NOT NULL,
                dq_score DOUBLE PRECISION NOT NULL,
                batch_id TEXT NOT NULL,
                processed_at TIMESTAMPTZ NOT NULL
            )",
            self.table
        );
        self.client.batch_execute(&ddl).await?;
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (customer_id, name, city, total_spend, purchase_count,
            last_purchase_date, avg_rating, feedback_count, feedback, dq_score,
            batch_id, processed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (customer_id) DO UPDATE SET
            name = EXCLUDED.name,
            city = EXCLUDED.city,
            total_spend = EXCLUDED.total_spend,
            purchase_count = EXCLUDED.purchase_count,
            last_purchase_date = EXCLUDED.last_purchase_date,
            avg_rating = EXCLUDED.avg_rating,
            feedback_count = EXCLUDED.feedback_count,
            feedback = EXCLUDED.feedback,
            dq_score = EXCLUDED.dq_score,
            batch_id = EXCLUDED.batch_id,
            processed_at = EXCLUDED.processed_at"
    )
}

fn from_row(row: &Row) -> Result<Customer360Entity, StoreError> {
    let feedback: Json<Vec<FeedbackEntry>> = row.try_get("feedback")?;
    let batch_id: String = row.try_get("batch_id")?;
    Ok(Customer360Entity {
        customer_id: row.try_get("customer_id")?,
        name: row.try_get("name")?,
        city: row.try_get("city")?,
        total_spend: row.try_get("total_spend")?,
        purchase_count: row.try_get::<_, i64>("purchase_count")?.max(0) as u64,
        last_purchase_date: row.try_get("last_purchase_date")?,
        avg_rating: row.try_get("avg_rating")?,
        feedback_count: row.try_get::<_, i64>("feedback_count")?.max(0) as u64,
        feedback: feedback.0,
        dq_score: row.try_get("dq_score")?,
        batch_id: BatchId::from(batch_id),
        processed_at: row.try_get("processed_at")?,
    })
}

#[async_trait]
impl CuratedStore for PostgresCuratedStore {
    async fn upsert(&self, entity: &Customer360Entity) -> Result<(), StoreError> {
        let purchase_count = entity.purchase_count as i64;
        let feedback_count = entity.feedback_count as i64;
        let feedback = Json(&entity.feedback);
        let batch_id = entity.batch_id.as_str();

        self.client
            .execute(
                &self.upsert_sql,
                &[
                    &entity.customer_id,
                    &entity.name,
                    &entity.city,
                    &entity.total_spend,
                    &purchase_count,
                    &entity.last_purchase_date,
                    &entity.avg_rating,
                    &feedback_count,
                    &feedback,
                    &entity.dq_score,
                    &batch_id,
                    &entity.processed_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, customer_id: &str) -> Result<Option<Customer360Entity>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE customer_id = $1", self.table);
        let row = self.client.query_opt(&sql, &[&customer_id]).await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn read_all(&self) -> Result<Vec<Customer360Entity>, StoreError> {
        let sql = format!("SELECT * FROM {} ORDER BY customer_id", self.table);
        let rows = self.client.query(&sql, &[]).await?;
        rows.iter().map(from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(is_identifier("customer_360"));
        assert!(is_identifier("_staging"));
        assert!(!is_identifier("360_customers"));
        assert!(!is_identifier("c360; DROP TABLE runs"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn upsert_replaces_every_column() {
        let sql = upsert_sql(DEFAULT_TABLE);
        assert!(sql.contains("ON CONFLICT (customer_id) DO UPDATE"));
        assert_eq!(sql.matches("EXCLUDED.").count(), 11);
    }
}
