//! Order endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common::{Currency, CustomerId, OrderId, SellerId, VariantId};
use domain::order::{Address, Order};
use orchestrator::{CreateOrderRequest, RequestedItem};
use serde::{Deserialize, Serialize};
use store::UnitOfWork;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderBody {
    pub customer_id: Uuid,
    pub currency: String,
    pub items: Vec<OrderItemBody>,
    pub shipping_address: AddressBody,
    pub billing_address: AddressBody,
}

#[derive(Deserialize)]
pub struct OrderItemBody {
    pub variant_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
}

#[derive(Serialize, Deserialize)]
pub struct AddressBody {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl From<AddressBody> for Address {
    fn from(body: AddressBody) -> Self {
        Address {
            name: body.name,
            line1: body.line1,
            line2: body.line2,
            city: body.city,
            postal_code: body.postal_code,
            country: body.country,
        }
    }
}

#[derive(Deserialize)]
pub struct ExpireBody {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub status: String,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub shipping_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub currency: String,
    pub items: Vec<OrderItemResponse>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub variant_id: String,
    pub seller_id: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub total_price_minor: i64,
    pub reservation_key: String,
    pub status: String,
    pub product_name: String,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            order_number: order.order_number().to_string(),
            customer_id: order.customer_id().to_string(),
            status: order.status().to_string(),
            subtotal_minor: order.totals().subtotal.minor(),
            tax_minor: order.totals().tax.minor(),
            shipping_minor: order.totals().shipping.minor(),
            discount_minor: order.totals().discount.minor(),
            total_minor: order.totals().total.minor(),
            currency: order.totals().currency.code().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    variant_id: item.variant_id.to_string(),
                    seller_id: item.seller_id.to_string(),
                    quantity: item.quantity,
                    unit_price_minor: item.unit_price.minor(),
                    total_price_minor: item.total_price.minor(),
                    reservation_key: item.reservation_key.to_string(),
                    status: item.status.to_string(),
                    product_name: item.snapshot.product_name.clone(),
                })
                .collect(),
            expires_at: order.expires_at(),
            created_at: order.created_at(),
        }
    }
}

#[derive(Serialize)]
pub struct ExpireResponse {
    pub cancelled: Vec<String>,
    pub errors: Vec<String>,
}

// -- Handlers --

/// POST /orders — run the order-creation saga.
#[tracing::instrument(skip(state, body))]
pub async fn create<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let currency = Currency::from_code(&body.currency)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported currency: {}", body.currency)))?;

    let request = CreateOrderRequest {
        customer_id: CustomerId::from_uuid(body.customer_id),
        currency,
        items: body
            .items
            .into_iter()
            .map(|item| RequestedItem {
                variant_id: VariantId::from_uuid(item.variant_id),
                seller_id: SellerId::from_uuid(item.seller_id),
                quantity: item.quantity,
            })
            .collect(),
        shipping_address: body.shipping_address.into(),
        billing_address: body.billing_address.into(),
    };

    let order = state.orchestrator.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}

/// GET /orders/{id} — load an order.
pub async fn get<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orchestrator
        .get_order(OrderId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {id}")))?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/expire — auto-cancel overdue pending orders.
pub async fn expire<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(body): Json<ExpireBody>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let report = state.orchestrator.expire_overdue_orders(body.limit).await?;
    Ok(Json(ExpireResponse {
        cancelled: report.cancelled.iter().map(|id| id.to_string()).collect(),
        errors: report
            .errors
            .iter()
            .map(|(id, err)| format!("{id}: {err}"))
            .collect(),
    }))
}
