use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{InventoryRecordId, OrderId, OrderNumber, ReservationKey, SellerId, VariantId};
use domain::inventory::{InventoryMovement, InventoryRecord, InventoryReservation};
use domain::order::Order;
use futures_util::future::BoxFuture;

use crate::StoreError;

/// Transaction-scoped repository handle.
///
/// Every method runs inside the serializable transaction opened by
/// [`UnitOfWork::serializable`]; nothing here is callable standalone, so
/// a read-then-write sequence on the same record is always isolated.
#[async_trait]
pub trait TxHandle: Send {
    /// Looks up the ledger record for a (variant, seller) pair.
    async fn find_inventory_record(
        &mut self,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    /// Looks up a ledger record by its id.
    async fn find_inventory_record_by_id(
        &mut self,
        id: InventoryRecordId,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    /// Inserts a new ledger record. Fails `DuplicateKey` if the
    /// (variant, seller) pair already exists.
    async fn insert_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError>;

    /// Writes back a mutated ledger record.
    async fn update_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError>;

    /// Looks up a reservation by its idempotency key.
    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<InventoryReservation>, StoreError>;

    /// Inserts a new reservation. Fails `DuplicateKey` if the key is
    /// already taken.
    async fn insert_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError>;

    /// Writes back a mutated reservation (status or reference changes).
    async fn update_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError>;

    /// Returns the keys of up to `limit` active reservations whose
    /// deadline has passed, oldest first.
    async fn expired_reservation_keys(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReservationKey>, StoreError>;

    /// Appends a movement to the ledger log. Movements are never updated
    /// or deleted.
    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), StoreError>;

    /// Inserts an order together with its items. Fails `DuplicateKey`
    /// on an order-number collision.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Loads an order with its items.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Writes back a mutated order (status, allow-list fields, refunds).
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Returns true if an order already carries this number.
    async fn order_number_exists(&mut self, number: &OrderNumber) -> Result<bool, StoreError>;

    /// Returns the ids of up to `limit` pending orders whose payment
    /// deadline has passed, oldest first.
    async fn overdue_order_ids(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OrderId>, StoreError>;
}

/// Opens serializable units of work.
///
/// `serializable` is generic over the closure's error type so callers can
/// fail a transaction with their own domain errors; anything the storage
/// layer raises converts in via `From<StoreError>`. The method returns a
/// boxed future by hand instead of using `async_trait` because of the
/// generic parameters.
pub trait UnitOfWork: Clone + Send + Sync + 'static {
    type Tx: TxHandle + Send;

    /// Runs `op` inside one serializable transaction.
    ///
    /// Commits when `op` returns `Ok`, rolls back otherwise. Either way,
    /// all writes made through the handle are a single atomic unit — no
    /// partial state is ever observable.
    fn serializable<'a, T, E, F>(&'a self, op: F) -> BoxFuture<'a, Result<T, E>>
    where
        T: Send + 'a,
        E: From<StoreError> + Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, Result<T, E>> + Send + 'a;
}
