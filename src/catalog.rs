//! Product catalog: read-mostly metadata (price, active flag, localized
//! names) consumed by the stock ledger and the order engine.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError};
use crate::models::{CreateProductRequest, Product, ProductWithStock, StockCheckResponse};

const WITH_STOCK: &str = "SELECT p.*, \
    COALESCE(s.quantity, 0) AS stock_quantity, \
    COALESCE(s.reserved_quantity, 0) AS reserved_quantity, \
    COALESCE(s.quantity, 0) - COALESCE(s.reserved_quantity, 0) AS available_quantity \
    FROM products p LEFT JOIN stock s ON p.id = s.product_id";

/// Picks the display name for a language, falling back to the default name
/// when the localized field is absent or blank. `fr` is the default language.
pub fn display_name<'a>(product: &'a Product, language: &str) -> &'a str {
    let localized = match language {
        "fr" => product.name_fr.as_deref(),
        "ar" => product.name_ar.as_deref(),
        "en" => product.name_en.as_deref(),
        _ => None,
    };
    match localized {
        Some(name) if !name.trim().is_empty() => name,
        _ => &product.name,
    }
}

/// Product lookup for ordering. Inactive products are rejected here, so an
/// order against one fails before any stock is touched.
pub async fn get_active(conn: &mut PgConnection, product_id: Uuid) -> Result<Product, AppError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND is_active = TRUE")
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found or inactive")))
}

pub async fn list(pool: &PgPool, active_only: bool) -> Result<Vec<ProductWithStock>, AppError> {
    let query = if active_only {
        format!("{WITH_STOCK} WHERE p.is_active = TRUE ORDER BY p.name")
    } else {
        format!("{WITH_STOCK} ORDER BY p.name")
    };
    let products = sqlx::query_as::<_, ProductWithStock>(&query)
        .fetch_all(pool)
        .await?;
    Ok(products)
}

pub async fn get_with_stock(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<ProductWithStock, AppError> {
    let query = format!("{WITH_STOCK} WHERE p.id = $1");
    sqlx::query_as::<_, ProductWithStock>(&query)
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))
}

/// Multilingual search across every name column and the product code.
pub async fn search(pool: &PgPool, term: &str) -> Result<Vec<ProductWithStock>, AppError> {
    let pattern = format!("%{term}%");
    let query = format!(
        "{WITH_STOCK} WHERE p.is_active = TRUE AND \
         (p.name ILIKE $1 OR p.name_fr ILIKE $1 OR p.name_ar ILIKE $1 \
          OR p.name_en ILIKE $1 OR p.code ILIKE $1) \
         ORDER BY p.name"
    );
    let products = sqlx::query_as::<_, ProductWithStock>(&query)
        .bind(pattern)
        .fetch_all(pool)
        .await?;
    Ok(products)
}

pub async fn create(pool: &PgPool, req: &CreateProductRequest) -> Result<Product, AppError> {
    if req.price.is_sign_negative() {
        return Err(AppError::InvalidInput(
            "price cannot be negative".to_string(),
        ));
    }
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, code, name, name_fr, name_ar, name_en, description, price, units_per_case, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.code)
    .bind(&req.name)
    .bind(&req.name_fr)
    .bind(&req.name_ar)
    .bind(&req.name_en)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.units_per_case)
    .bind(req.is_active)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err, "products_code_key") {
            AppError::Conflict(format!("product code {} already exists", req.code))
        } else {
            AppError::Storage(err)
        }
    })?;
    Ok(product)
}

/// The availability contract: derived quantity plus default and localized
/// display names. NotFound for unknown or inactive products.
pub async fn check_availability(
    pool: &PgPool,
    product_id: Uuid,
    language: &str,
) -> Result<StockCheckResponse, AppError> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND is_active = TRUE",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found or inactive")))?;

    // A product without a stock row reads as zero availability here.
    let available = match crate::stock::get_available(pool, product_id).await {
        Ok(quantity) => quantity,
        Err(AppError::NotFound(_)) => 0,
        Err(err) => return Err(err),
    };

    Ok(StockCheckResponse {
        product_id: product.id,
        available: available > 0,
        quantity: available,
        product_name: product.name.clone(),
        product_name_local: display_name(&product, language).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn sample_product() -> Product {
        Product {
            id: Uuid::now_v7(),
            code: "CC-33CL".to_string(),
            name: "Coca-Cola 33cl".to_string(),
            name_fr: Some("Coca-Cola 33cl".to_string()),
            name_ar: Some("كوكا كولا ٣٣ سل".to_string()),
            name_en: None,
            description: None,
            price: Decimal::new(250, 2),
            units_per_case: 24,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_uses_localized_field() {
        let product = sample_product();
        assert_eq!(display_name(&product, "ar"), "كوكا كولا ٣٣ سل");
    }

    #[test]
    fn display_name_falls_back_when_missing() {
        let product = sample_product();
        assert_eq!(display_name(&product, "en"), "Coca-Cola 33cl");
    }

    #[test]
    fn display_name_falls_back_when_blank() {
        let mut product = sample_product();
        product.name_fr = Some("  ".to_string());
        assert_eq!(display_name(&product, "fr"), "Coca-Cola 33cl");
    }

    #[test]
    fn display_name_unknown_language_uses_default() {
        let product = sample_product();
        assert_eq!(display_name(&product, "es"), "Coca-Cola 33cl");
    }
}
