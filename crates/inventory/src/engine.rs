use chrono::{DateTime, Utc};
use common::{ReservationKey, SellerId, VariantId};
use domain::inventory::{InventoryMovement, InventoryReservation};
use domain::DomainEvent;
use store::{EventBus, StoreError, TxHandle, UnitOfWork};

use crate::error::ReservationError;

/// A request to hold stock against one (variant, seller) record.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    /// Idempotency token; a replay with the same key returns the
    /// existing reservation unchanged.
    pub reservation_key: ReservationKey,
    /// What the hold is for, e.g. `"order"`.
    pub reference_type: String,
    /// The id of the thing it is for; the orchestrator starts with a
    /// placeholder and patches in the order id at persist time.
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
}

/// Outcome of an expired-reservation sweep.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Keys that were released.
    pub released: Vec<ReservationKey>,
    /// Keys that failed, with the failure message. A failed release does
    /// not abort the rest of the batch.
    pub errors: Vec<(ReservationKey, String)>,
}

/// Creates, releases, and commits time-boxed reservations against the
/// ledger.
///
/// All four writes of a `reserve` (reservation row, record update,
/// movement append — and on the other operations the equivalent set) are
/// one atomic unit; no half-applied reservation is ever observable.
#[derive(Clone)]
pub struct ReservationEngine<U, B> {
    uow: U,
    bus: B,
}

impl<U: UnitOfWork, B: EventBus> ReservationEngine<U, B> {
    /// Creates a new engine over a unit-of-work store and an event bus.
    pub fn new(uow: U, bus: B) -> Self {
        Self { uow, bus }
    }

    /// Reserves stock, idempotently.
    ///
    /// An existing `Active` reservation under the same key is returned
    /// unchanged; a resolved one fails `AlreadyResolved`. Otherwise the
    /// record's availability is checked and decremented, the reservation
    /// is created `Active`, and a `Reserved` movement is appended.
    #[tracing::instrument(skip(self, request), fields(reservation_key = %request.reservation_key))]
    pub async fn reserve(
        &self,
        request: ReserveRequest,
    ) -> Result<InventoryReservation, ReservationError> {
        let (reservation, event) = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    if let Some(existing) = tx.find_reservation(&request.reservation_key).await? {
                        if existing.status.is_active() {
                            tracing::debug!("idempotent replay, returning existing reservation");
                            return Ok((existing, None));
                        }
                        return Err(ReservationError::AlreadyResolved {
                            key: request.reservation_key.clone(),
                            status: existing.status,
                        });
                    }

                    let mut record = tx
                        .find_inventory_record(request.variant_id, request.seller_id)
                        .await?
                        .ok_or(ReservationError::RecordNotFound {
                            variant_id: request.variant_id,
                            seller_id: request.seller_id,
                        })?;

                    // Fails before any write when stock is short.
                    record.reserve(request.quantity)?;

                    let reservation = InventoryReservation::new(
                        record.id,
                        request.quantity,
                        request.reservation_key,
                        request.reference_type,
                        request.reference_id,
                        request.expires_at,
                        request.created_by,
                    )?;

                    tx.insert_reservation(&reservation).await?;
                    tx.update_inventory_record(&record).await?;
                    tx.append_movement(&InventoryMovement::reserved(
                        record.id,
                        reservation.quantity,
                        reservation.id.to_string(),
                        "stock reserved",
                    ))
                    .await?;

                    let event = DomainEvent::inventory_reserved(
                        &reservation,
                        record.variant_id,
                        record.seller_id,
                    );
                    Ok((reservation, Some(event)))
                })
            })
            .await?;

        // Only a fresh reservation mutated the ledger; a replay emits
        // nothing.
        if let Some(event) = event {
            metrics::counter!("inventory_reservations_total").increment(1);
            self.bus.publish(event);
        } else {
            metrics::counter!("inventory_reserve_replays_total").increment(1);
        }
        Ok(reservation)
    }

    /// Releases an active reservation, returning its quantity to
    /// available stock.
    ///
    /// A second release of the same key deterministically fails
    /// `InvalidState` and leaves the ledger untouched.
    #[tracing::instrument(skip(self), fields(reservation_key = %key))]
    pub async fn release(
        &self,
        key: &ReservationKey,
        released_by: &str,
        reason: &str,
    ) -> Result<InventoryReservation, ReservationError> {
        let key = key.clone();
        let reason = reason.to_string();
        let actor = released_by.to_string();

        let (reservation, event) = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    let mut reservation = tx
                        .find_reservation(&key)
                        .await?
                        .ok_or_else(|| ReservationError::NotFound(key.clone()))?;
                    reservation.release()?;

                    let mut record = tx
                        .find_inventory_record_by_id(reservation.record_id)
                        .await?
                        .ok_or_else(|| {
                            ReservationError::Store(StoreError::NotFound {
                                entity: "inventory_record",
                                id: reservation.record_id.to_string(),
                            })
                        })?;
                    record.release(reservation.quantity)?;

                    tx.update_reservation(&reservation).await?;
                    tx.update_inventory_record(&record).await?;
                    tx.append_movement(&InventoryMovement::released(
                        record.id,
                        reservation.quantity,
                        reservation.id.to_string(),
                        &reason,
                    ))
                    .await?;

                    tracing::info!(released_by = %actor, reason = %reason, "reservation released");
                    let event = DomainEvent::inventory_released(
                        &reservation,
                        record.variant_id,
                        record.seller_id,
                        &reason,
                    );
                    Ok::<_, ReservationError>((reservation, event))
                })
            })
            .await?;

        metrics::counter!("inventory_releases_total").increment(1);
        self.bus.publish(event);
        Ok(reservation)
    }

    /// Commits an active reservation; the stock is permanently consumed
    /// and does not return to available.
    #[tracing::instrument(skip(self), fields(reservation_key = %key))]
    pub async fn commit(
        &self,
        key: &ReservationKey,
        committed_by: &str,
        reason: &str,
    ) -> Result<InventoryReservation, ReservationError> {
        let key = key.clone();
        let reason = reason.to_string();
        let actor = committed_by.to_string();

        let (reservation, event) = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    let mut reservation = tx
                        .find_reservation(&key)
                        .await?
                        .ok_or_else(|| ReservationError::NotFound(key.clone()))?;
                    reservation.commit()?;

                    let mut record = tx
                        .find_inventory_record_by_id(reservation.record_id)
                        .await?
                        .ok_or_else(|| {
                            ReservationError::Store(StoreError::NotFound {
                                entity: "inventory_record",
                                id: reservation.record_id.to_string(),
                            })
                        })?;
                    record.commit(reservation.quantity)?;

                    tx.update_reservation(&reservation).await?;
                    tx.update_inventory_record(&record).await?;
                    // The OUT movement references what the stock was
                    // consumed for, not the reservation row.
                    tx.append_movement(&InventoryMovement::out(
                        record.id,
                        reservation.quantity,
                        reservation.reference_id.clone(),
                        &reason,
                    ))
                    .await?;

                    tracing::info!(committed_by = %actor, reason = %reason, "reservation committed");
                    let event = DomainEvent::inventory_committed(
                        &reservation,
                        record.variant_id,
                        record.seller_id,
                    );
                    Ok::<_, ReservationError>((reservation, event))
                })
            })
            .await?;

        metrics::counter!("inventory_commits_total").increment(1);
        self.bus.publish(event);
        Ok(reservation)
    }

    /// Releases active reservations whose deadline has passed, in a
    /// bounded batch.
    ///
    /// This is a housekeeping sweep, not a transactional unit: each
    /// release is its own unit of work, and per-item failures are
    /// collected rather than aborting the batch.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_expired(&self, limit: usize) -> Result<CleanupReport, ReservationError> {
        let cutoff = Utc::now();
        let keys: Vec<ReservationKey> = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    tx.expired_reservation_keys(cutoff, limit)
                        .await
                        .map_err(ReservationError::from)
                })
            })
            .await?;

        let mut report = CleanupReport::default();
        for key in keys {
            match self.release(&key, "system", "expired").await {
                Ok(_) => report.released.push(key),
                Err(err) => {
                    tracing::warn!(reservation_key = %key, %err, "failed to release expired reservation");
                    report.errors.push((key, err.to_string()));
                }
            }
        }

        metrics::counter!("inventory_expired_released_total")
            .increment(report.released.len() as u64);
        if !report.released.is_empty() || !report.errors.is_empty() {
            tracing::info!(
                released = report.released.len(),
                errors = report.errors.len(),
                "expired reservation sweep finished"
            );
        }
        Ok(report)
    }
}
