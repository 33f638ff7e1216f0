use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{InventoryRecordId, OrderId, OrderNumber, ReservationKey, SellerId, VariantId};
use domain::inventory::{InventoryMovement, InventoryRecord, InventoryReservation};
use domain::order::Order;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::uow::{TxHandle, UnitOfWork};
use crate::StoreError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    records: HashMap<InventoryRecordId, InventoryRecord>,
    record_index: HashMap<(VariantId, SellerId), InventoryRecordId>,
    reservations: HashMap<ReservationKey, InventoryReservation>,
    movements: Vec<InventoryMovement>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store for tests.
///
/// The mutex serializes transactions outright, which makes the isolation
/// trivially serializable; each transaction works on a copy of the state
/// that is only written back when the closure succeeds, which gives
/// atomicity. Same contract as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

/// A transaction over a working copy of the store state.
pub struct MemoryTx {
    working: MemoryState,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a ledger record and returns its id.
    pub async fn seed_inventory(
        &self,
        variant_id: VariantId,
        seller_id: SellerId,
        available: i64,
    ) -> InventoryRecordId {
        let record = InventoryRecord::new(variant_id, seller_id, available);
        let id = record.id;
        let mut state = self.state.lock().await;
        state.record_index.insert((variant_id, seller_id), id);
        state.records.insert(id, record);
        id
    }

    /// Returns the current ledger record for a pair, if any.
    pub async fn inventory_record(
        &self,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Option<InventoryRecord> {
        let state = self.state.lock().await;
        let id = state.record_index.get(&(variant_id, seller_id))?;
        state.records.get(id).cloned()
    }

    /// Returns a reservation by key, if any.
    pub async fn reservation(&self, key: &ReservationKey) -> Option<InventoryReservation> {
        self.state.lock().await.reservations.get(key).cloned()
    }

    /// Returns all movements recorded against one ledger record.
    pub async fn movements_for(&self, record_id: InventoryRecordId) -> Vec<InventoryMovement> {
        self.state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.record_id == record_id)
            .cloned()
            .collect()
    }

    /// Sums the quantities of active reservations on one record.
    pub async fn active_reservation_total(&self, record_id: InventoryRecordId) -> i64 {
        self.state
            .lock()
            .await
            .reservations
            .values()
            .filter(|r| r.record_id == record_id && r.status.is_active())
            .map(|r| r.quantity)
            .sum()
    }

    /// Returns an order by id, if any.
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl UnitOfWork for MemoryStore {
    type Tx = MemoryTx;

    fn serializable<'a, T, E, F>(&'a self, op: F) -> BoxFuture<'a, Result<T, E>>
    where
        T: Send + 'a,
        E: From<StoreError> + Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, Result<T, E>> + Send + 'a,
    {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut tx = MemoryTx {
                working: state.clone(),
            };
            match op(&mut tx).await {
                Ok(value) => {
                    *state = tx.working;
                    Ok(value)
                }
                Err(err) => Err(err),
            }
        })
    }
}

#[async_trait]
impl TxHandle for MemoryTx {
    async fn find_inventory_record(
        &mut self,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let Some(id) = self.working.record_index.get(&(variant_id, seller_id)) else {
            return Ok(None);
        };
        Ok(self.working.records.get(id).cloned())
    }

    async fn find_inventory_record_by_id(
        &mut self,
        id: InventoryRecordId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.working.records.get(&id).cloned())
    }

    async fn insert_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError> {
        let pair = (record.variant_id, record.seller_id);
        if self.working.record_index.contains_key(&pair) {
            return Err(StoreError::DuplicateKey {
                entity: "inventory_record",
                key: format!("{}/{}", record.variant_id, record.seller_id),
            });
        }
        self.working.record_index.insert(pair, record.id);
        self.working.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError> {
        if !self.working.records.contains_key(&record.id) {
            return Err(StoreError::NotFound {
                entity: "inventory_record",
                id: record.id.to_string(),
            });
        }
        self.working.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<InventoryReservation>, StoreError> {
        Ok(self.working.reservations.get(key).cloned())
    }

    async fn insert_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError> {
        if self
            .working
            .reservations
            .contains_key(&reservation.reservation_key)
        {
            return Err(StoreError::DuplicateKey {
                entity: "inventory_reservation",
                key: reservation.reservation_key.to_string(),
            });
        }
        self.working
            .reservations
            .insert(reservation.reservation_key.clone(), reservation.clone());
        Ok(())
    }

    async fn update_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError> {
        if !self
            .working
            .reservations
            .contains_key(&reservation.reservation_key)
        {
            return Err(StoreError::NotFound {
                entity: "inventory_reservation",
                id: reservation.reservation_key.to_string(),
            });
        }
        self.working
            .reservations
            .insert(reservation.reservation_key.clone(), reservation.clone());
        Ok(())
    }

    async fn expired_reservation_keys(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReservationKey>, StoreError> {
        let mut expired: Vec<&InventoryReservation> = self
            .working
            .reservations
            .values()
            .filter(|r| r.status.is_active() && r.expires_at <= cutoff)
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        Ok(expired
            .into_iter()
            .take(limit)
            .map(|r| r.reservation_key.clone())
            .collect())
    }

    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), StoreError> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateKey {
                entity: "order",
                key: order.id().to_string(),
            });
        }
        if self
            .working
            .orders
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(StoreError::DuplicateKey {
                entity: "order",
                key: order.order_number().to_string(),
            });
        }
        self.working.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if !self.working.orders.contains_key(&order.id()) {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            });
        }
        self.working.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn order_number_exists(&mut self, number: &OrderNumber) -> Result<bool, StoreError> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.order_number() == number))
    }

    async fn overdue_order_ids(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OrderId>, StoreError> {
        let mut overdue: Vec<&Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.is_expired(cutoff))
            .collect();
        overdue.sort_by_key(|o| o.expires_at());
        Ok(overdue.into_iter().take(limit).map(|o| o.id()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_applies_writes() {
        let store = MemoryStore::new();
        let variant_id = VariantId::new();
        let seller_id = SellerId::new();

        store
            .serializable(move |tx| {
                Box::pin(async move {
                    let record = InventoryRecord::new(variant_id, seller_id, 10);
                    tx.insert_inventory_record(&record).await
                })
            })
            .await
            .unwrap();

        let record = store.inventory_record(variant_id, seller_id).await.unwrap();
        assert_eq!(record.available, 10);
    }

    #[tokio::test]
    async fn rollback_discards_all_writes() {
        let store = MemoryStore::new();
        let variant_id = VariantId::new();
        let seller_id = SellerId::new();
        store.seed_inventory(variant_id, seller_id, 10).await;

        let result: Result<(), StoreError> = store
            .serializable(move |tx| {
                Box::pin(async move {
                    let mut record = tx
                        .find_inventory_record(variant_id, seller_id)
                        .await?
                        .unwrap();
                    record.available = 0;
                    tx.update_inventory_record(&record).await?;
                    Err(StoreError::SerializationConflict)
                })
            })
            .await;

        assert!(result.is_err());
        let record = store.inventory_record(variant_id, seller_id).await.unwrap();
        assert_eq!(record.available, 10, "rolled-back write leaked");
    }

    #[tokio::test]
    async fn duplicate_reservation_key_is_rejected() {
        let store = MemoryStore::new();
        let record_id = store
            .seed_inventory(VariantId::new(), SellerId::new(), 10)
            .await;
        let key = ReservationKey::generate();

        for attempt in 0..2 {
            let key = key.clone();
            let result: Result<(), StoreError> = store
                .serializable(move |tx| {
                    Box::pin(async move {
                        let reservation = InventoryReservation::new(
                            record_id,
                            1,
                            key,
                            "order",
                            "pending-order",
                            Utc::now(),
                            "test",
                        )
                        .expect("valid reservation");
                        tx.insert_reservation(&reservation).await
                    })
                })
                .await;
            if attempt == 0 {
                result.unwrap();
            } else {
                assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
            }
        }
    }

    #[tokio::test]
    async fn expired_scan_is_bounded_and_ordered() {
        let store = MemoryStore::new();
        let record_id = store
            .seed_inventory(VariantId::new(), SellerId::new(), 10)
            .await;
        let now = Utc::now();

        let keys: Vec<ReservationKey> = (0..3).map(|_| ReservationKey::generate()).collect();
        for (i, key) in keys.iter().enumerate() {
            let key = key.clone();
            let expires_at = now - chrono::Duration::minutes(10 - i as i64);
            store
                .serializable(move |tx| {
                    Box::pin(async move {
                        let reservation = InventoryReservation::new(
                            record_id,
                            1,
                            key,
                            "order",
                            "pending-order",
                            expires_at,
                            "test",
                        )
                        .expect("valid reservation");
                        tx.insert_reservation(&reservation).await
                    })
                })
                .await
                .unwrap();
        }

        let found: Vec<ReservationKey> = store
            .serializable(move |tx| {
                Box::pin(async move { tx.expired_reservation_keys(now, 2).await })
            })
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0], keys[0], "oldest expiry first");
    }
}
