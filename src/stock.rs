//! Stock ledger: per-product quantity on hand and quantity reserved.
//!
//! `available = quantity - reserved_quantity` is always derived, never
//! stored. Mutations take `&mut PgConnection` so they compose into the
//! caller's transaction; the check-then-reserve sequence must hold the row
//! lock taken by [`lock`] for the whole unit of work. `adjust` is the one
//! self-contained transaction here.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{MovementType, ReferenceType};
use crate::movements;

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct StockLevel {
    pub quantity: i32,
    pub reserved_quantity: i32,
}

impl StockLevel {
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }
}

/// Locks the product's stock row for the rest of the transaction.
/// `None` means no stock row exists; callers treat that as zero stock.
pub async fn lock(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<Option<StockLevel>, AppError> {
    let level = sqlx::query_as::<_, StockLevel>(
        "SELECT quantity, reserved_quantity FROM stock WHERE product_id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(level)
}

/// Unlocked availability read. Fails with NotFound when no stock row exists.
pub async fn get_available(pool: &PgPool, product_id: Uuid) -> Result<i32, AppError> {
    let level = sqlx::query_as::<_, StockLevel>(
        "SELECT quantity, reserved_quantity FROM stock WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("no stock record for product {product_id}")))?;
    Ok(level.available())
}

/// Commits `amount` units to an order. The caller must have confirmed
/// availability under the lock taken by [`lock`] in this same transaction.
pub async fn reserve(
    conn: &mut PgConnection,
    product_id: Uuid,
    amount: i32,
) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidInput(
            "reserve amount must be positive".to_string(),
        ));
    }
    sqlx::query(
        "UPDATE stock SET reserved_quantity = reserved_quantity + $1, last_updated = NOW() \
         WHERE product_id = $2",
    )
    .bind(amount)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns `amount` reserved units to availability (order cancellation).
pub async fn release(
    conn: &mut PgConnection,
    product_id: Uuid,
    amount: i32,
) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidInput(
            "release amount must be positive".to_string(),
        ));
    }
    sqlx::query(
        "UPDATE stock SET reserved_quantity = reserved_quantity - $1, last_updated = NOW() \
         WHERE product_id = $2",
    )
    .bind(amount)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Signed movement delta for an absolute quantity correction.
fn adjustment_delta(previous: Option<i32>, new_quantity: i32) -> i32 {
    new_quantity - previous.unwrap_or(0)
}

/// Manual stock correction: upserts `quantity` to the absolute value and
/// appends one `adjustment` movement with the signed delta, atomically.
/// Serializes against concurrent reservations on the same product via the
/// row lock.
pub async fn adjust(
    pool: &PgPool,
    product_id: Uuid,
    new_quantity: i32,
    notes: Option<&str>,
) -> Result<(), AppError> {
    if new_quantity < 0 {
        return Err(AppError::InvalidInput(
            "stock quantity cannot be negative".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let known: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
    if known.is_none() {
        return Err(AppError::NotFound(format!("product {product_id} not found")));
    }

    let previous = lock(&mut tx, product_id).await?.map(|level| level.quantity);
    sqlx::query(
        "INSERT INTO stock (product_id, quantity) VALUES ($1, $2) \
         ON CONFLICT (product_id) DO UPDATE SET quantity = EXCLUDED.quantity, last_updated = NOW()",
    )
    .bind(product_id)
    .bind(new_quantity)
    .execute(&mut *tx)
    .await?;

    movements::append(
        &mut tx,
        product_id,
        MovementType::Adjustment,
        adjustment_delta(previous, new_quantity),
        ReferenceType::Manual,
        None,
        notes,
    )
    .await?;

    tx.commit().await?;
    tracing::info!(%product_id, new_quantity, "stock adjusted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_quantity_minus_reserved() {
        let level = StockLevel {
            quantity: 10,
            reserved_quantity: 4,
        };
        assert_eq!(level.available(), 6);
    }

    #[test]
    fn adjustment_delta_against_existing_row() {
        assert_eq!(adjustment_delta(Some(12), 20), 8);
        assert_eq!(adjustment_delta(Some(20), 12), -8);
    }

    #[test]
    fn adjustment_delta_seeds_from_zero() {
        assert_eq!(adjustment_delta(None, 20), 20);
    }
}
