use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use inventory_service::InventoryHandler;
use serde::{Deserialize, Serialize};
use shared::*;
use tracing::error;
use uuid::Uuid;

use crate::availability::AvailabilityCalculator;
use crate::handlers::OrderHandler;
use crate::settlement::SettlementEngine;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<InventoryHandler>,
    pub orders: Arc<OrderHandler>,
    pub settlement: Arc<SettlementEngine>,
    pub availability: Arc<AvailabilityCalculator>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseStatusBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub shop_id: String,
    pub page: i64,
    pub page_size: i64,
    pub products: Vec<ProductDetail>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    pub shop_id: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PayOrderBody {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayOrderResponse {
    pub order_id: Uuid,
    pub payment_id: Uuid,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn error_response(err: CommerceError) -> ApiError {
    let status = match &err {
        CommerceError::BadRequest(_) => StatusCode::BAD_REQUEST,
        CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
        CommerceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CommerceError::UniqueViolation => StatusCode::CONFLICT,
        CommerceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &err {
        CommerceError::Internal { .. } => {
            error!("Request failed: {}", err);
            "internal server error".to_string()
        }
        _ => err.to_string(),
    };

    (status, Json(ErrorResponse { error: message }))
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

/// Caller identity, taken from the `x-user-id` header set by the
/// authentication layer in front of this service.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AuthenticatedUser(value.to_string()))
            .ok_or_else(|| {
                error_response(CommerceError::Unauthorized(format!(
                    "missing {} header",
                    USER_ID_HEADER
                )))
            })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/warehouses", post(create_warehouse))
        .route("/warehouses/:id/status", put(update_warehouse_status))
        .route("/shops", post(create_shop))
        .route("/shops/warehouses", put(bind_shop_warehouses))
        .route("/shops/:id/products", get(list_shop_products))
        .route("/products", post(create_product))
        .route("/products/stock", put(update_product_stock))
        .route("/products/transfer", post(transfer_product))
        .route("/orders", post(place_order))
        .route("/orders/:id/payment", post(pay_order))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(request): Json<CreateWarehouseRequest>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    let id = state
        .inventory
        .create_warehouse(&request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn update_warehouse_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WarehouseStatusBody>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .inventory
        .update_warehouse_status(&UpdateWarehouseStatusRequest {
            id,
            enabled: body.enabled,
        })
        .await
        .map_err(error_response)?;
    Ok(message("warehouse status updated"))
}

pub async fn create_shop(
    State(state): State<AppState>,
    Json(request): Json<CreateShopRequest>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    let id = state
        .inventory
        .create_shop(&request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn bind_shop_warehouses(
    State(state): State<AppState>,
    Json(request): Json<BindShopWarehousesRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .inventory
        .bind_shop_to_warehouses(&request)
        .await
        .map_err(error_response)?;
    Ok(message("shop warehouses updated"))
}

pub async fn list_shop_products(
    State(state): State<AppState>,
    Path(shop_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<ProductListResponse>> {
    let defaults = Page::default();
    let page = Page {
        page: params.page.unwrap_or(defaults.page),
        page_size: params.page_size.unwrap_or(defaults.page_size),
    }
    .normalized();

    let products = state
        .availability
        .shop_products(&shop_id, page)
        .await
        .map_err(error_response)?;
    Ok(Json(ProductListResponse {
        shop_id,
        page: page.page,
        page_size: page.page_size,
        products,
    }))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<IdResponse>)> {
    let id = state
        .inventory
        .create_product(&request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn update_product_stock(
    State(state): State<AppState>,
    Json(request): Json<UpdateStockRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .inventory
        .update_product_stock(&request)
        .await
        .map_err(error_response)?;
    Ok(message("product stock updated"))
}

pub async fn transfer_product(
    State(state): State<AppState>,
    Json(request): Json<TransferProductRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .inventory
        .transfer_product(&request)
        .await
        .map_err(error_response)?;
    Ok(message("product transferred"))
}

pub async fn place_order(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(body): Json<PlaceOrderBody>,
) -> ApiResult<(StatusCode, Json<PlaceOrderResponse>)> {
    let order_id = state
        .orders
        .place_order(&PlaceOrderRequest {
            shop_id: body.shop_id,
            user_id,
            items: body.items,
        })
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(PlaceOrderResponse { order_id })))
}

pub async fn pay_order(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(body): Json<PayOrderBody>,
) -> ApiResult<Json<PayOrderResponse>> {
    let payment_id = state
        .settlement
        .pay_order(&PayOrderRequest {
            order_id,
            amount: body.amount,
            user_id,
        })
        .await
        .map_err(error_response)?;
    Ok(Json(PayOrderResponse {
        order_id,
        payment_id,
    }))
}
