//! Postgres ingredient store
//!
//! One transaction per batch. Every record gets its own savepoint so a bad
//! row is rolled back alone and the rest of the batch still commits.

use crate::error::StoreError;
use crate::writer::{IngredientStore, UpsertOutcome};
use async_trait::async_trait;
use pantry_common::types::{CanonicalIngredient, NutrientField};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{error, info};

/// Non-nutrient columns, in bind order; `fdc_id` first as the conflict key
const BASE_COLUMNS: [&str; 10] = [
    "fdc_id",
    "name",
    "category",
    "data_type",
    "brand_owner",
    "search_text",
    "tags",
    "dietary_flags",
    "data_source",
    "synced_at",
];

static UPSERT_SQL: LazyLock<String> = LazyLock::new(build_upsert_sql);

/// Upsert statement over [`BASE_COLUMNS`] followed by every nutrient column
fn build_upsert_sql() -> String {
    let columns: Vec<&str> = BASE_COLUMNS
        .iter()
        .copied()
        .chain(NutrientField::ALL.iter().map(|field| field.column()))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|column| format!("    {column} = EXCLUDED.{column},"))
        .collect();

    format!(
        "INSERT INTO ingredients ({})\n\
         VALUES ({})\n\
         ON CONFLICT (fdc_id) DO UPDATE SET\n\
         {}\n    updated_at = NOW()\n\
         RETURNING (xmax = 0) AS inserted",
        columns.join(", "),
        placeholders.join(", "),
        updates.join("\n")
    )
}

/// Ingredient store backed by the `ingredients` table
#[derive(Clone)]
pub struct PgIngredientStore {
    db: PgPool,
}

impl PgIngredientStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        info!(max_connections = max_connections, "Database connection pool created");
        Ok(Self::new(db))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Upsert a single record inside the batch transaction.
    ///
    /// Returns `true` when the row was inserted, `false` when it replaced an
    /// existing one.
    async fn upsert_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &CanonicalIngredient,
    ) -> Result<bool, sqlx::Error> {
        let mut query = sqlx::query(UPSERT_SQL.as_str())
            .bind(record.fdc_id)
            .bind(&record.name)
            .bind(&record.category)
            .bind(&record.data_type)
            .bind(&record.brand_owner)
            .bind(&record.search_text)
            .bind(&record.tags)
            .bind(record.dietary_flag_names())
            .bind(&record.data_source)
            .bind(record.synced_at);
        for field in NutrientField::ALL {
            query = query.bind(record.nutrients.get(field));
        }

        let row = query.fetch_one(&mut **tx).await?;

        row.try_get::<bool, _>("inserted")
    }
}

#[async_trait]
impl IngredientStore for PgIngredientStore {
    async fn upsert_batch(
        &self,
        records: &[CanonicalIngredient],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        let mut tx = self.db.begin().await?;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            sqlx::query("SAVEPOINT ingredient_savepoint")
                .execute(&mut *tx)
                .await?;

            match Self::upsert_tx(&mut tx, record).await {
                Ok(inserted) => {
                    sqlx::query("RELEASE SAVEPOINT ingredient_savepoint")
                        .execute(&mut *tx)
                        .await?;
                    outcomes.push(if inserted {
                        UpsertOutcome::Inserted
                    } else {
                        UpsertOutcome::Duplicate
                    });
                },
                Err(e) => {
                    sqlx::query("ROLLBACK TO SAVEPOINT ingredient_savepoint")
                        .execute(&mut *tx)
                        .await?;
                    error!(
                        fdc_id = record.fdc_id,
                        error = %e,
                        "Failed to store ingredient (isolated with savepoint)"
                    );
                    outcomes.push(UpsertOutcome::Failed(e.to_string()));
                },
            }
        }

        tx.commit().await?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_sql_binds_every_column() {
        let sql = UPSERT_SQL.as_str();
        assert!(sql.contains("$20)"));
        assert!(!sql.contains("$21"));
        for field in NutrientField::ALL {
            assert!(sql.contains(&format!("{0} = EXCLUDED.{0}", field.column())));
        }
        assert!(!sql.contains("fdc_id = EXCLUDED"));
        assert!(sql.ends_with("RETURNING (xmax = 0) AS inserted"));
    }
}
