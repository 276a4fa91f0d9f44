//! Append-only stock movement log. Rows are never updated or deleted; every
//! entry is written in the same transaction as the ledger mutation it
//! documents.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{MovementType, ReferenceType, StockMovement};

pub async fn append(
    conn: &mut PgConnection,
    product_id: Uuid,
    movement_type: MovementType,
    quantity_delta: i32,
    reference_type: ReferenceType,
    reference_id: Option<Uuid>,
    notes: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO stock_movements (id, product_id, movement_type, quantity, reference_type, reference_id, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(movement_type)
    .bind(quantity_delta)
    .bind(reference_type)
    .bind(reference_id)
    .bind(notes)
    .execute(conn)
    .await?;
    Ok(())
}

/// Audit read, newest first.
pub async fn list_for_product(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<Vec<StockMovement>, AppError> {
    let movements = sqlx::query_as::<_, StockMovement>(
        "SELECT * FROM stock_movements WHERE product_id = $1 ORDER BY created_at DESC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(movements)
}
