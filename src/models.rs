//! Typed records for every entity, constructed once at the storage boundary,
//! plus the request/response shapes of the HTTP surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub name_fr: Option<String>,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub units_per_case: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product joined with its stock row; missing stock reads as zero.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductWithStock {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub name_fr: Option<String>,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub units_per_case: i32,
    pub is_active: bool,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Adjustment,
    Out,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reference_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Manual,
    Order,
}

/// Append-only audit fact; `quantity` is the signed delta.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub language: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Order line as returned by the read paths, with the product name attached.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLineView {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineView>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn default_language() -> String {
    "fr".to_string()
}

fn default_units_per_case() -> i32 {
    24
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub name_fr: Option<String>,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_units_per_case")]
    #[validate(range(min = 1))]
    pub units_per_case: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockUpdateRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1))]
    pub customer_phone: String,
    pub customer_name: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockCheckResponse {
    pub product_id: Uuid,
    pub available: bool,
    pub quantity: i32,
    pub product_name: String,
    pub product_name_local: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_defaults_language_to_fr() {
        let req: CreateOrderRequest = serde_json::from_str(
            r#"{"customer_phone": "0661000000", "items": [{"product_id": "00000000-0000-0000-0000-000000000001", "quantity": 2}]}"#,
        )
        .unwrap();
        assert_eq!(req.language, "fr");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_item_list_fails_validation() {
        let req: CreateOrderRequest = serde_json::from_str(
            r#"{"customer_phone": "0661000000", "items": []}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn product_request_defaults() {
        let req: CreateProductRequest =
            serde_json::from_str(r#"{"code": "CC-33CL", "name": "Coca-Cola 33cl", "price": "2.50"}"#)
                .unwrap();
        assert_eq!(req.units_per_case, 24);
        assert!(req.is_active);
    }
}
