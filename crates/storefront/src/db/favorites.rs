//! Favorite repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use toko_core::{FavoriteId, FavoriteRecord, ProductId, ProductSummary, UserId};

use super::{RepositoryError, map_constraint};

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    id: FavoriteId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    product_id: ProductId,
    name: String,
    price: Decimal,
    image_url: Option<String>,
}

impl From<FavoriteRow> for FavoriteRecord {
    fn from(row: FavoriteRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.price,
                image_url: row.image_url,
            },
            created_at: row.created_at,
        }
    }
}

/// Repository for the `favorites` table.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's favorites with product data, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<FavoriteRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r"
            SELECT f.id, f.user_id, f.created_at, p.id AS product_id, p.name, p.price, p.image_url
            FROM favorites f
            JOIN products p ON p.id = f.product_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            ",
        )
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FavoriteRecord::from).collect())
    }

    /// Product codes a user has favorited.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids(&self, user: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ProductId>(
            "SELECT product_id FROM favorites WHERE user_id = $1",
        )
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }

    /// Insert a favorite, doing nothing if the pair exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product or user does not exist.
    pub async fn insert(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<Option<FavoriteId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, FavoriteId>(
            r"
            INSERT INTO favorites (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(user)
        .bind(product)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("product {product} does not exist")))?;

        Ok(id)
    }

    /// Insert many favorites in a single statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any product does not exist; no
    /// rows are inserted in that case.
    pub async fn insert_many(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<usize, RepositoryError> {
        if products.is_empty() {
            return Ok(0);
        }

        let codes: Vec<String> = products.iter().map(|p| p.as_str().to_owned()).collect();
        let result = sqlx::query(
            r"
            INSERT INTO favorites (user_id, product_id)
            SELECT $1, code FROM UNNEST($2::text[]) AS code
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user)
        .bind(codes)
        .execute(self.pool)
        .await
        .map_err(|e| map_constraint(e, "favorited product does not exist"))?;

        usize::try_from(result.rows_affected())
            .map_err(|_| RepositoryError::DataCorruption("row count overflow".to_owned()))
    }

    /// Delete a favorite by id, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user: UserId, id: FavoriteId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the favorite for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_product(
        &self,
        user: UserId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all of a user's favorites.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1")
            .bind(user)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
