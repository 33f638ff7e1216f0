use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Currency, CustomerId, InventoryRecordId, Money, OrderId, OrderNumber, ReservationId,
    ReservationKey, SellerId, VariantId,
};
use domain::inventory::{
    InventoryMovement, InventoryRecord, InventoryReservation, ReservationStatus,
};
use domain::order::{
    Address, Order, OrderItem, OrderItemStatus, OrderParts, OrderStatus, PricingTotals,
    ProductSnapshot,
};
use futures_util::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::uow::{TxHandle, UnitOfWork};
use crate::StoreError;

/// PostgreSQL-backed store.
///
/// Every unit of work runs under `SERIALIZABLE` isolation; concurrent
/// transactions touching the same inventory record serialize at the
/// database, and the loser surfaces as `SerializationConflict`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// A live serializable transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresStore {
    /// Creates a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::from)
    }
}

impl UnitOfWork for PostgresStore {
    type Tx = PgTx;

    fn serializable<'a, T, E, F>(&'a self, op: F) -> BoxFuture<'a, Result<T, E>>
    where
        T: Send + 'a,
        E: From<StoreError> + Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, Result<T, E>> + Send + 'a,
    {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| E::from(StoreError::Database(e)))?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await
                .map_err(|e| E::from(map_db_err(e)))?;

            let mut handle = PgTx { tx };
            match op(&mut handle).await {
                Ok(value) => {
                    handle
                        .tx
                        .commit()
                        .await
                        .map_err(|e| E::from(map_db_err(e)))?;
                    Ok(value)
                }
                Err(err) => {
                    // Rollback failures are secondary to the original error.
                    if let Err(rollback_err) = handle.tx.rollback().await {
                        tracing::warn!(%rollback_err, "transaction rollback failed");
                    }
                    Err(err)
                }
            }
        })
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some("40001")
    {
        return StoreError::SerializationConflict;
    }
    StoreError::Database(e)
}

fn map_insert_err(e: sqlx::Error, entity: &'static str, key: String) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::DuplicateKey { entity, key };
    }
    map_db_err(e)
}

fn decode_err(message: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(serde_json::Error::io(std::io::Error::other(
        message.to_string(),
    )))
}

fn row_to_record(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    Ok(InventoryRecord {
        id: InventoryRecordId::from_uuid(row.try_get("id")?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
        seller_id: SellerId::from_uuid(row.try_get("seller_id")?),
        available: row.try_get("available")?,
        reserved: row.try_get("reserved")?,
    })
}

fn row_to_reservation(row: &PgRow) -> Result<InventoryReservation, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(InventoryReservation {
        id: ReservationId::from_uuid(row.try_get("id")?),
        record_id: InventoryRecordId::from_uuid(row.try_get("record_id")?),
        quantity: row.try_get("quantity")?,
        reservation_key: ReservationKey::new(row.try_get::<String, _>("reservation_key")?),
        reference_type: row.try_get("reference_type")?,
        reference_id: row.try_get("reference_id")?,
        status: status.parse::<ReservationStatus>().map_err(decode_err)?,
        expires_at: row.try_get("expires_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem, StoreError> {
    let status: String = row.try_get("status")?;
    let snapshot: ProductSnapshot = serde_json::from_value(row.try_get("snapshot")?)?;
    Ok(OrderItem {
        id: row.try_get("id")?,
        variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
        seller_id: SellerId::from_uuid(row.try_get("seller_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: Money::from_minor(row.try_get("unit_price")?),
        total_price: Money::from_minor(row.try_get("total_price")?),
        reservation_key: ReservationKey::new(row.try_get::<String, _>("reservation_key")?),
        status: status.parse::<OrderItemStatus>().map_err(decode_err)?,
        snapshot,
        refunded_quantity: row.try_get("refunded_quantity")?,
        refunded_amount: Money::from_minor(row.try_get("refunded_amount")?),
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let currency: String = row.try_get("currency")?;
    let shipping_address: Address = serde_json::from_value(row.try_get("shipping_address")?)?;
    let billing_address: Address = serde_json::from_value(row.try_get("billing_address")?)?;
    let version: i64 = row.try_get("version")?;

    Ok(Order::rehydrate(OrderParts {
        id: OrderId::from_uuid(row.try_get("id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        customer_id: CustomerId::from_uuid(row.try_get("customer_id")?),
        status: status.parse::<OrderStatus>().map_err(decode_err)?,
        totals: PricingTotals {
            subtotal: Money::from_minor(row.try_get("subtotal")?),
            tax: Money::from_minor(row.try_get("tax")?),
            shipping: Money::from_minor(row.try_get("shipping")?),
            discount: Money::from_minor(row.try_get("discount")?),
            total: Money::from_minor(row.try_get("total")?),
            currency: Currency::from_code(&currency)
                .ok_or_else(|| decode_err(format!("unknown currency: {currency}")))?,
        },
        shipping_address,
        billing_address,
        items,
        expires_at: row.try_get("expires_at")?,
        version: version as u64,
        created_at: row.try_get("created_at")?,
        tracking_number: row.try_get("tracking_number")?,
        delivered_at: row.try_get("delivered_at")?,
        notes: row.try_get("notes")?,
    }))
}

#[async_trait]
impl TxHandle for PgTx {
    async fn find_inventory_record(
        &mut self,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, variant_id, seller_id, available, reserved
            FROM inventory_records
            WHERE variant_id = $1 AND seller_id = $2
            "#,
        )
        .bind(variant_id.as_uuid())
        .bind(seller_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_inventory_record_by_id(
        &mut self,
        id: InventoryRecordId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, variant_id, seller_id, available, reserved
            FROM inventory_records
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_records (id, variant_id, seller_id, available, reserved)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.variant_id.as_uuid())
        .bind(record.seller_id.as_uuid())
        .bind(record.available)
        .bind(record.reserved)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_insert_err(
                e,
                "inventory_record",
                format!("{}/{}", record.variant_id, record.seller_id),
            )
        })?;
        Ok(())
    }

    async fn update_inventory_record(
        &mut self,
        record: &InventoryRecord,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_records
            SET available = $2, reserved = $3
            WHERE id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.available)
        .bind(record.reserved)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "inventory_record",
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_reservation(
        &mut self,
        key: &ReservationKey,
    ) -> Result<Option<InventoryReservation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, record_id, quantity, reservation_key, reference_type, reference_id,
                   status, expires_at, created_by, created_at
            FROM inventory_reservations
            WHERE reservation_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    async fn insert_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_reservations
                (id, record_id, quantity, reservation_key, reference_type, reference_id,
                 status, expires_at, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.record_id.as_uuid())
        .bind(reservation.quantity)
        .bind(reservation.reservation_key.as_str())
        .bind(&reservation.reference_type)
        .bind(&reservation.reference_id)
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(&reservation.created_by)
        .bind(reservation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_insert_err(
                e,
                "inventory_reservation",
                reservation.reservation_key.to_string(),
            )
        })?;
        Ok(())
    }

    async fn update_reservation(
        &mut self,
        reservation: &InventoryReservation,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = $2, reference_type = $3, reference_id = $4, expires_at = $5
            WHERE reservation_key = $1
            "#,
        )
        .bind(reservation.reservation_key.as_str())
        .bind(reservation.status.as_str())
        .bind(&reservation.reference_type)
        .bind(&reservation.reference_id)
        .bind(reservation.expires_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "inventory_reservation",
                id: reservation.reservation_key.to_string(),
            });
        }
        Ok(())
    }

    async fn expired_reservation_keys(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReservationKey>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT reservation_key
            FROM inventory_reservations
            WHERE status = 'Active' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        rows.iter()
            .map(|row| {
                Ok(ReservationKey::new(
                    row.try_get::<String, _>("reservation_key")?,
                ))
            })
            .collect()
    }

    async fn append_movement(&mut self, movement: &InventoryMovement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements
                (id, record_id, kind, quantity, reason, reference, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id)
        .bind(movement.record_id.as_uuid())
        .bind(movement.kind.as_str())
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, order_number, customer_id, status, subtotal, tax, shipping, discount,
                 total, currency, shipping_address, billing_address, expires_at, version,
                 created_at, tracking_number, delivered_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.customer_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.totals().subtotal.minor())
        .bind(order.totals().tax.minor())
        .bind(order.totals().shipping.minor())
        .bind(order.totals().discount.minor())
        .bind(order.totals().total.minor())
        .bind(order.totals().currency.code())
        .bind(serde_json::to_value(order.shipping_address())?)
        .bind(serde_json::to_value(order.billing_address())?)
        .bind(order.expires_at())
        .bind(order.version() as i64)
        .bind(order.created_at())
        .bind(order.tracking_number())
        .bind(order.delivered_at())
        .bind(order.notes())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_err(e, "order", order.order_number().to_string()))?;

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (id, order_id, variant_id, seller_id, quantity, unit_price, total_price,
                     reservation_key, status, snapshot, refunded_quantity, refunded_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(item.id)
            .bind(order.id().as_uuid())
            .bind(item.variant_id.as_uuid())
            .bind(item.seller_id.as_uuid())
            .bind(item.quantity)
            .bind(item.unit_price.minor())
            .bind(item.total_price.minor())
            .bind(item.reservation_key.as_str())
            .bind(item.status.as_str())
            .bind(serde_json::to_value(&item.snapshot)?)
            .bind(item.refunded_quantity)
            .bind(item.refunded_amount.minor())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(order_row) = sqlx::query(
            r#"
            SELECT id, order_number, customer_id, status, subtotal, tax, shipping, discount,
                   total, currency, shipping_address, billing_address, expires_at, version,
                   created_at, tracking_number, delivered_at, notes
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT id, variant_id, seller_id, quantity, unit_price, total_price,
                   reservation_key, status, snapshot, refunded_quantity, refunded_amount
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        let items = item_rows
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        row_to_order(&order_row, items).map(Some)
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, shipping_address = $3, billing_address = $4, version = $5,
                tracking_number = $6, delivered_at = $7, notes = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(serde_json::to_value(order.shipping_address())?)
        .bind(serde_json::to_value(order.billing_address())?)
        .bind(order.version() as i64)
        .bind(order.tracking_number())
        .bind(order.delivered_at())
        .bind(order.notes())
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            });
        }

        for item in order.items() {
            sqlx::query(
                r#"
                UPDATE order_items
                SET status = $2, refunded_quantity = $3, refunded_amount = $4
                WHERE id = $1
                "#,
            )
            .bind(item.id)
            .bind(item.status.as_str())
            .bind(item.refunded_quantity)
            .bind(item.refunded_amount.minor())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn order_number_exists(&mut self, number: &OrderNumber) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(number.as_str())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_db_err)?;
        Ok(exists)
    }

    async fn overdue_order_ids(
        &mut self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OrderId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM orders
            WHERE status = 'Pending' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        rows.iter()
            .map(|row| Ok(OrderId::from_uuid(row.try_get::<Uuid, _>("id")?)))
            .collect()
    }
}
