//! Cart repository.
//!
//! Adding to a cart is a single `INSERT ... ON CONFLICT DO UPDATE` so two
//! concurrent adds of the same product increment one row instead of racing
//! an existence check against an insert.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use toko_core::{Cart, CartId, CartItem, CartItemId, CartLine, GuestCartItem, ProductId, UserId};

use super::{RepositoryError, map_constraint, quantity_from_db, quantity_to_db};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: quantity_from_db(row.quantity)?,
            unit_price: row.unit_price,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    image_url: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
}

const UPSERT_ITEM: &str = r"
    INSERT INTO cart_items (cart_id, product_id, quantity, unit_price)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (cart_id, product_id) DO UPDATE
        SET quantity = cart_items.quantity + EXCLUDED.quantity
    RETURNING id, cart_id, product_id, quantity, unit_price, created_at
";

/// Repository for the `carts` and `cart_items` tables.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the cart belonging to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_user(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Create a cart for a user, or return the one that already exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user has no profile row.
    pub async fn create(&self, user: UserId) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at
            ",
        )
        .bind(user)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "cart owner does not exist"))?;

        Ok(row.into())
    }

    /// List a cart's lines joined with product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored quantity is invalid.
    pub async fn lines(&self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.product_id, p.name, p.image_url, ci.quantity, ci.unit_price, ci.created_at
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(cart)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    product_id: row.product_id,
                    name: row.name,
                    image_url: row.image_url,
                    quantity: quantity_from_db(row.quantity)?,
                    unit_price: row.unit_price,
                    added_at: row.created_at,
                })
            })
            .collect()
    }

    /// Insert a line or increment the existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product does not exist.
    pub async fn upsert_item(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_item(&mut *conn, cart, product, quantity, unit_price).await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart: CartId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE cart_items
            SET quantity = $3
            WHERE cart_id = $1 AND product_id = $2
            RETURNING id, cart_id, product_id, quantity, unit_price, created_at
            ",
        )
        .bind(cart)
        .bind(product)
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    /// Delete a single line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart: CartId,
        product: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart)
            .bind(product)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every line in a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Merge guest lines into a cart inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failing upsert's error; nothing is committed then.
    pub async fn merge(
        &self,
        cart: CartId,
        items: &[GuestCartItem],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            upsert_item(
                &mut *tx,
                cart,
                &item.product_id,
                item.quantity,
                item.unit_price,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(items.len())
    }
}

async fn upsert_item(
    conn: &mut PgConnection,
    cart: CartId,
    product: &ProductId,
    quantity: u32,
    unit_price: Decimal,
) -> Result<CartItem, RepositoryError> {
    let row = sqlx::query_as::<_, CartItemRow>(UPSERT_ITEM)
        .bind(cart)
        .bind(product)
        .bind(quantity_to_db(quantity)?)
        .bind(unit_price)
        .fetch_one(conn)
        .await
        .map_err(|e| map_constraint(e, &format!("product {product} does not exist")))?;

    row.try_into()
}
