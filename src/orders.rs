//! Order engine and order read paths.
//!
//! `create_order` is the one critical section of the service: availability
//! checks and reservations for every line item happen under row locks inside
//! a single transaction, acquired in ascending product-id order so
//! concurrent multi-product orders cannot deadlock. Any failure after
//! validation drops the transaction, rolling back every write.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::catalog;
use crate::error::{is_unique_violation, AppError};
use crate::models::{
    CreateOrderRequest, CreateOrderResponse, MovementType, Order, OrderItem, OrderItemRequest,
    OrderLineView, OrderStatus, OrderWithItems, ReferenceType,
};
use crate::movements;
use crate::stock;

/// Bounded retries when a generated order number collides.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Rejects empty orders and non-positive quantities before any storage call.
fn validate_items(items: &[OrderItemRequest]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::InvalidInput(
            "order must contain at least one item".to_string(),
        ));
    }
    if items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::InvalidInput(
            "item quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Requested units per distinct product. The BTreeMap gives ascending
/// product-id iteration, which is also the lock acquisition order.
fn aggregate_quantities(items: &[OrderItemRequest]) -> BTreeMap<Uuid, i64> {
    let mut wanted = BTreeMap::new();
    for item in items {
        *wanted.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }
    wanted
}

fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Human-readable order number: date component plus an opaque suffix.
fn generate_order_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{date}-{suffix}")
}

pub async fn create_order(
    pool: &PgPool,
    req: &CreateOrderRequest,
) -> Result<CreateOrderResponse, AppError> {
    // Validation happens before any storage call.
    req.validate()
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;
    validate_items(&req.items)?;

    let mut last_conflict = None;
    for attempt in 0..ORDER_NUMBER_ATTEMPTS {
        match try_create(pool, req).await {
            Err(AppError::Conflict(msg)) => {
                tracing::warn!(attempt, %msg, "order number collision, retrying");
                last_conflict = Some(AppError::Conflict(msg));
            }
            other => return other,
        }
    }
    Err(last_conflict.unwrap_or_else(|| {
        AppError::Conflict("could not allocate a unique order number".to_string())
    }))
}

/// One unit of work: lock, check, price, persist, reserve, log, commit.
async fn try_create(
    pool: &PgPool,
    req: &CreateOrderRequest,
) -> Result<CreateOrderResponse, AppError> {
    let mut tx = pool.begin().await?;

    // Lock every referenced stock row in ascending product-id order and
    // verify availability against the per-product aggregate. The first
    // shortfall aborts the whole order.
    let wanted = aggregate_quantities(&req.items);
    let mut products = HashMap::with_capacity(wanted.len());
    for (&product_id, &requested) in &wanted {
        let product = catalog::get_active(&mut tx, product_id).await?;
        let level = stock::lock(&mut tx, product_id).await?;
        let available = level.map(|l| l.available()).unwrap_or(0);
        if i64::from(available) < requested {
            return Err(AppError::InsufficientStock {
                product: product.name,
                available,
            });
        }
        products.insert(product_id, product);
    }

    // Price snapshot: the catalog rows read above, in this transaction.
    // Later price edits never affect this order.
    let mut total_amount = Decimal::ZERO;
    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let unit_price = products[&item.product_id].price;
        let total_price = line_total(unit_price, item.quantity);
        total_amount += total_price;
        lines.push((item.product_id, item.quantity, unit_price, total_price));
    }

    let order_id = Uuid::now_v7();
    let order_number = generate_order_number();
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_phone, customer_name, language, total_amount, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(&req.customer_phone)
    .bind(&req.customer_name)
    .bind(&req.language)
    .bind(total_amount)
    .bind(&req.notes)
    .execute(&mut *tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err, "orders_order_number_key") {
            AppError::Conflict(format!("order number {order_number} already exists"))
        } else {
            AppError::Storage(err)
        }
    })?;

    for &(product_id, quantity, unit_price, total_price) in &lines {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(total_price)
        .execute(&mut *tx)
        .await?;
    }

    // Reserve and log per line, still under the locks taken above.
    for &(product_id, quantity, _, _) in &lines {
        stock::reserve(&mut tx, product_id, quantity).await?;
        movements::append(
            &mut tx,
            product_id,
            MovementType::Out,
            -quantity,
            ReferenceType::Order,
            Some(order_id),
            Some("reservation for order"),
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!(%order_id, %order_number, %total_amount, "order created");

    Ok(CreateOrderResponse {
        order_id,
        order_number,
        total_amount,
        status: OrderStatus::Pending,
        message: "order created".to_string(),
    })
}

/// Cancels a pending order: returns every line's reserved units to
/// availability and appends one `in` movement per line, atomically.
pub async fn cancel_order(pool: &PgPool, order_id: Uuid) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(
            "only pending orders can be cancelled".to_string(),
        ));
    }

    let items: Vec<OrderItem> = sqlx::query_as(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(&mut *tx)
    .await?;

    for item in &items {
        stock::release(&mut tx, item.product_id, item.quantity).await?;
        movements::append(
            &mut tx,
            item.product_id,
            MovementType::In,
            item.quantity,
            ReferenceType::Order,
            Some(order_id),
            Some("release for cancelled order"),
        )
        .await?;
    }

    let cancelled = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(%order_id, "order cancelled");
    Ok(cancelled)
}

// ---------------------------------------------------------------------------
// Read paths. Plain pool reads, no locking; an order with zero items yields
// an empty list.
// ---------------------------------------------------------------------------

async fn items_for(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderLineView>, AppError> {
    let items = sqlx::query_as::<_, OrderLineView>(
        "SELECT oi.product_id, p.name AS product_name, oi.quantity, oi.unit_price, oi.total_price \
         FROM order_items oi JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = $1",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn get_order(pool: &PgPool, order_id: Uuid) -> Result<OrderWithItems, AppError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    let items = items_for(pool, order.id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn orders_for_customer(
    pool: &PgPool,
    customer_phone: &str,
    limit: i64,
) -> Result<Vec<OrderWithItems>, AppError> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE customer_phone = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(customer_phone)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let items = items_for(pool, order.id).await?;
        result.push(OrderWithItems { order, items });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: Uuid, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product_id,
            quantity,
        }
    }

    #[test]
    fn empty_item_list_is_invalid() {
        let err = validate_items(&[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let err = validate_items(&[item(Uuid::now_v7(), 0)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = validate_items(&[item(Uuid::now_v7(), -3)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn positive_quantities_pass_validation() {
        assert!(validate_items(&[item(Uuid::now_v7(), 1)]).is_ok());
    }

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn order_numbers_do_not_trivially_collide() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert_ne!(a, b);
    }

    #[test]
    fn line_total_multiplies_price_snapshot() {
        // quantity 4 at 2.50 is 10.00
        let total = line_total(Decimal::new(250, 2), 4);
        assert_eq!(total, Decimal::new(1000, 2));
    }

    #[test]
    fn totals_sum_over_lines() {
        let prices = [
            (Decimal::new(250, 2), 4),
            (Decimal::new(1200, 2), 2),
            (Decimal::new(99, 2), 1),
        ];
        let total: Decimal = prices
            .iter()
            .map(|&(price, qty)| line_total(price, qty))
            .sum();
        assert_eq!(total, Decimal::new(3499, 2));
    }

    #[test]
    fn aggregation_sums_duplicate_product_lines() {
        let p1 = Uuid::now_v7();
        let p2 = Uuid::now_v7();
        let wanted = aggregate_quantities(&[item(p1, 3), item(p2, 1), item(p1, 2)]);
        assert_eq!(wanted.len(), 2);
        assert_eq!(wanted[&p1], 5);
        assert_eq!(wanted[&p2], 1);
    }

    #[test]
    fn aggregation_iterates_in_ascending_product_order() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(u128::MAX);
        let wanted = aggregate_quantities(&[item(high, 1), item(low, 1)]);
        let order: Vec<&Uuid> = wanted.keys().collect();
        assert_eq!(order, vec![&low, &high]);
    }
}
