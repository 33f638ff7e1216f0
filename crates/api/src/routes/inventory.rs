//! Inventory and reservation endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use common::{Money, ReservationKey, SellerId, VariantId};
use domain::inventory::{InventoryRecord, InventoryReservation};
use inventory::ReserveRequest;
use serde::{Deserialize, Serialize};
use store::{TxHandle, UnitOfWork};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateRecordBody {
    pub variant_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
    /// Unit price registered with the pricing collaborator so the
    /// variant is orderable.
    pub unit_price_minor: i64,
}

#[derive(Deserialize)]
pub struct ReserveBody {
    pub variant_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
    pub reservation_key: String,
    #[serde(default = "default_reference_type")]
    pub reference_type: String,
    #[serde(default = "default_actor")]
    pub reference_id: String,
    #[serde(default = "default_ttl_minutes")]
    pub expires_in_minutes: i64,
    #[serde(default = "default_actor")]
    pub created_by: String,
}

#[derive(Deserialize)]
pub struct ResolveBody {
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CleanupBody {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_reference_type() -> String {
    "order".to_string()
}

fn default_actor() -> String {
    "api".to_string()
}

fn default_ttl_minutes() -> i64 {
    30
}

fn default_limit() -> usize {
    100
}

// -- Response types --

#[derive(Serialize)]
pub struct RecordResponse {
    pub record_id: String,
    pub variant_id: String,
    pub seller_id: String,
    pub available: i64,
    pub reserved: i64,
}

impl RecordResponse {
    fn from_record(record: &InventoryRecord) -> Self {
        Self {
            record_id: record.id.to_string(),
            variant_id: record.variant_id.to_string(),
            seller_id: record.seller_id.to_string(),
            available: record.available,
            reserved: record.reserved,
        }
    }
}

#[derive(Serialize)]
pub struct ReservationResponse {
    pub reservation_key: String,
    pub status: String,
    pub quantity: i64,
    pub reference_type: String,
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
}

impl ReservationResponse {
    fn from_reservation(reservation: &InventoryReservation) -> Self {
        Self {
            reservation_key: reservation.reservation_key.to_string(),
            status: reservation.status.to_string(),
            quantity: reservation.quantity,
            reference_type: reservation.reference_type.clone(),
            reference_id: reservation.reference_id.clone(),
            expires_at: reservation.expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub released: Vec<String>,
    pub errors: Vec<String>,
}

// -- Handlers --

/// POST /inventory/records — seed stock for a (variant, seller) pair.
pub async fn create_record<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(body): Json<CreateRecordBody>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    if body.quantity < 0 {
        return Err(ApiError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }
    let variant_id = VariantId::from_uuid(body.variant_id);
    let seller_id = SellerId::from_uuid(body.seller_id);

    let record = InventoryRecord::new(variant_id, seller_id, body.quantity);
    let stored = record.clone();
    state
        .store
        .serializable(move |tx| Box::pin(async move { tx.insert_inventory_record(&stored).await }))
        .await?;
    state
        .pricing
        .set_price(variant_id, Money::from_minor(body.unit_price_minor));

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse::from_record(&record)),
    ))
}

/// GET /inventory/records/{variant_id}/{seller_id} — current quantities.
pub async fn get_record<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path((variant_id, seller_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RecordResponse>, ApiError> {
    let variant_id = VariantId::from_uuid(variant_id);
    let seller_id = SellerId::from_uuid(seller_id);

    let record = state
        .store
        .serializable(move |tx| {
            Box::pin(async move { tx.find_inventory_record(variant_id, seller_id).await })
        })
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "no inventory record for {variant_id}/{seller_id}"
            ))
        })?;
    Ok(Json(RecordResponse::from_record(&record)))
}

/// POST /inventory/reservations — reserve stock (idempotent by key).
pub async fn reserve<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(body): Json<ReserveBody>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let reservation = state
        .engine
        .reserve(ReserveRequest {
            variant_id: VariantId::from_uuid(body.variant_id),
            seller_id: SellerId::from_uuid(body.seller_id),
            quantity: body.quantity,
            reservation_key: ReservationKey::new(body.reservation_key),
            reference_type: body.reference_type,
            reference_id: body.reference_id,
            expires_at: Utc::now() + Duration::minutes(body.expires_in_minutes),
            created_by: body.created_by,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse::from_reservation(&reservation)),
    ))
}

/// POST /inventory/reservations/{key}/release — return stock.
pub async fn release<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(key): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reason = body.reason.unwrap_or_else(|| "released via api".to_string());
    let reservation = state
        .engine
        .release(&ReservationKey::new(key), &body.actor, &reason)
        .await?;
    Ok(Json(ReservationResponse::from_reservation(&reservation)))
}

/// POST /inventory/reservations/{key}/commit — consume stock.
pub async fn commit<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(key): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reason = body.reason.unwrap_or_else(|| "committed via api".to_string());
    let reservation = state
        .engine
        .commit(&ReservationKey::new(key), &body.actor, &reason)
        .await?;
    Ok(Json(ReservationResponse::from_reservation(&reservation)))
}

/// POST /inventory/cleanup — release expired reservations.
pub async fn cleanup<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(body): Json<CleanupBody>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let report = state.engine.cleanup_expired(body.limit).await?;
    Ok(Json(CleanupResponse {
        released: report.released.iter().map(|k| k.to_string()).collect(),
        errors: report
            .errors
            .iter()
            .map(|(key, err)| format!("{key}: {err}"))
            .collect(),
    }))
}
