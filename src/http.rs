//! HTTP surface: router and thin handlers delegating to the service modules.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::catalog;
use crate::error::AppError;
use crate::models::{
    CreateOrderRequest, CreateOrderResponse, CreateProductRequest, Order, OrderWithItems,
    Product, ProductWithStock, StockCheckResponse, StockMovement, StockUpdateRequest,
};
use crate::movements;
use crate::orders;
use crate::stock;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/:id", get(get_product))
        .route("/api/products/search/:term", get(search_products))
        .route("/api/stock/check/:product_id", get(check_stock))
        .route("/api/stock/:product_id", put(update_stock))
        .route("/api/stock/:product_id/movements", get(list_movements))
        .route("/api/orders", post(create_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/cancel", post(cancel_order))
        .route("/api/orders/customer/:phone", get(customer_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
    })))
}

#[derive(Debug, Deserialize)]
struct ListProductsParams {
    active_only: Option<bool>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<Vec<ProductWithStock>>, AppError> {
    let products = catalog::list(&state.db, params.active_only.unwrap_or(true)).await?;
    Ok(Json(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductWithStock>, AppError> {
    let product = catalog::get_with_stock(&state.db, id).await?;
    Ok(Json(product))
}

async fn search_products(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<Vec<ProductWithStock>>, AppError> {
    let products = catalog::search(&state.db, &term).await?;
    Ok(Json(products))
}

async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    req.validate()
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;
    let product = catalog::create(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Debug, Deserialize)]
struct LanguageParam {
    language: Option<String>,
}

async fn check_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<LanguageParam>,
) -> Result<Json<StockCheckResponse>, AppError> {
    let language = params.language.as_deref().unwrap_or("fr");
    let check = catalog::check_availability(&state.db, product_id, language).await?;
    Ok(Json(check))
}

async fn update_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<StockUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;
    stock::adjust(&state.db, product_id, req.quantity, req.notes.as_deref()).await?;
    Ok(Json(serde_json::json!({ "message": "stock updated" })))
}

async fn list_movements(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, AppError> {
    let entries = movements::list_for_product(&state.db, product_id).await?;
    Ok(Json(entries))
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let response = orders::create_order(&state.db, &req).await?;

    // Best-effort event publication after commit; never affects the reply.
    if let Some(nats) = &state.nats {
        match serde_json::to_vec(&response) {
            Ok(payload) => {
                if let Err(err) = nats.publish("orders.created", payload.into()).await {
                    tracing::warn!(%err, "failed to publish order event");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to encode order event"),
        }
    }

    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderWithItems>, AppError> {
    let order = orders::get_order(&state.db, id).await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = orders::cancel_order(&state.db, id).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
struct CustomerOrdersParams {
    limit: Option<i64>,
}

async fn customer_orders(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Query(params): Query<CustomerOrdersParams>,
) -> Result<Json<Vec<OrderWithItems>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let history = orders::orders_for_customer(&state.db, &phone, limit).await?;
    Ok(Json(history))
}
