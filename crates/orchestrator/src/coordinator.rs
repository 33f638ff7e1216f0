//! The order-creation coordinator.

use chrono::{Duration, Utc};
use common::{OrderId, OrderNumber, ReservationKey};
use domain::order::{Order, OrderItem};
use domain::DomainEvent;
use inventory::{ReservationEngine, ReserveRequest};
use store::{EventBus, StoreError, TxHandle, UnitOfWork};

use crate::compensation::{CompensationAction, CompensationStack};
use crate::error::OrchestratorError;
use crate::request::CreateOrderRequest;
use crate::services::{AuditEntry, AuditService, PricingService, ValidationService};

/// Reservations made for an order before it exists reference this
/// placeholder; phase 4 patches in the real order id.
const PENDING_ORDER_REFERENCE: &str = "pending-order";

const RESERVATION_TTL_MINUTES: i64 = 30;
const ORDER_TTL_MINUTES: i64 = 30;

/// Outcome of an overdue-order sweep.
#[derive(Debug, Default)]
pub struct ExpiryReport {
    /// Orders that were auto-cancelled.
    pub cancelled: Vec<OrderId>,
    /// Orders that failed, with the failure message.
    pub errors: Vec<(OrderId, String)>,
}

/// Drives the five-phase order-creation workflow and owns the
/// compensation stack.
///
/// One instance serves many concurrent requests; the only state shared
/// between them is the ledger and order rows in the transactional store.
#[derive(Clone)]
pub struct OrderOrchestrator<U, B, P, V, A> {
    uow: U,
    engine: ReservationEngine<U, B>,
    pricing: P,
    validation: V,
    audit: A,
    bus: B,
    reservation_ttl: Duration,
    order_ttl: Duration,
}

impl<U, B, P, V, A> OrderOrchestrator<U, B, P, V, A>
where
    U: UnitOfWork,
    B: EventBus,
    P: PricingService,
    V: ValidationService,
    A: AuditService,
{
    /// Creates a new orchestrator with the default 30-minute expiries.
    pub fn new(uow: U, bus: B, pricing: P, validation: V, audit: A) -> Self {
        Self {
            engine: ReservationEngine::new(uow.clone(), bus.clone()),
            uow,
            pricing,
            validation,
            audit,
            bus,
            reservation_ttl: Duration::minutes(RESERVATION_TTL_MINUTES),
            order_ttl: Duration::minutes(ORDER_TTL_MINUTES),
        }
    }

    /// Overrides the reservation and order deadlines.
    pub fn with_ttls(mut self, reservation_ttl: Duration, order_ttl: Duration) -> Self {
        self.reservation_ttl = reservation_ttl;
        self.order_ttl = order_ttl;
        self
    }

    /// Creates an order, or fails having undone everything it did.
    ///
    /// The caller receives either a fully formed order with active
    /// reservations, or a structured error and no partial state. Business
    /// failures come back as `Err` values; nothing here panics for an
    /// expected failure.
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, OrchestratorError> {
        metrics::counter!("orders_attempted_total").increment(1);
        let started = std::time::Instant::now();

        let mut stack = CompensationStack::default();
        match self.run_pipeline(&request, &mut stack).await {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_creation_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id(),
                    order_number = %order.order_number(),
                    total = %order.totals().total,
                    "order created"
                );
                Ok(order)
            }
            Err(err) => {
                metrics::counter!("orders_failed_total").increment(1);
                tracing::warn!(error = %err, kind = ?err.kind(), "order creation failed, compensating");
                self.compensate(std::mem::take(&mut stack)).await;
                self.bus
                    .publish(DomainEvent::order_failed(request.customer_id, err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &CreateOrderRequest,
        stack: &mut CompensationStack,
    ) -> Result<Order, OrchestratorError> {
        // Phase 1: validate. No side effect exists yet, so a failure
        // here needs no compensation.
        self.validation.validate_order_structure(request).await?;
        self.validation.validate_customer(request.customer_id).await?;
        self.validation.validate_variants(&request.items).await?;
        self.validation
            .validate_inventory_availability(&request.items)
            .await?;
        self.validation.validate_business_rules(request).await?;

        // Phase 2: price and lock the total.
        let priced = self
            .pricing
            .calculate_item_pricing(&request.items, request.customer_id)
            .await?;
        let subtotal = priced.iter().map(|item| item.total_price).sum();
        let tax = self
            .pricing
            .calculate_taxes(&priced, &request.shipping_address)
            .await?;
        let shipping = self
            .pricing
            .calculate_shipping(&priced, &request.shipping_address)
            .await?;
        let discount = self
            .pricing
            .apply_discounts(subtotal, request.customer_id)
            .await?;
        let totals = domain::order::PricingTotals {
            subtotal,
            tax,
            shipping,
            discount,
            total: subtotal + tax + shipping - discount,
            currency: request.currency,
        };
        let lock = self
            .pricing
            .lock_prices(request.customer_id, totals.total)
            .await?;
        stack.push(CompensationAction::ReleasePriceLock {
            lock_id: lock.lock_id.clone(),
        });

        // Phase 3: reserve stock per item, in item-list order. The first
        // failure aborts; holds already taken in this request unwind via
        // the stack rather than dangling until expiry.
        let expires_at = Utc::now() + self.reservation_ttl;
        let mut keys = Vec::with_capacity(priced.len());
        for item in &priced {
            let key = ReservationKey::generate();
            self.engine
                .reserve(ReserveRequest {
                    variant_id: item.variant_id,
                    seller_id: item.seller_id,
                    quantity: item.quantity,
                    reservation_key: key.clone(),
                    reference_type: "order".to_string(),
                    reference_id: PENDING_ORDER_REFERENCE.to_string(),
                    expires_at,
                    created_by: "order-orchestrator".to_string(),
                })
                .await?;
            stack.push(CompensationAction::ReleaseReservation { key: key.clone() });
            keys.push(key);
        }

        // Phase 4: persist everything in one serializable transaction.
        // Its own atomicity is the compensation for this phase; nothing
        // new goes on the stack.
        let order_id = OrderId::new();
        let mut items = Vec::with_capacity(priced.len());
        for (item, key) in priced.into_iter().zip(keys) {
            items.push(OrderItem::new(
                item.variant_id,
                item.seller_id,
                item.quantity,
                item.unit_price,
                key,
                item.snapshot,
            )?);
        }
        let customer_id = request.customer_id;
        let shipping_address = request.shipping_address.clone();
        let billing_address = request.billing_address.clone();
        let order_expires_at = Utc::now() + self.order_ttl;

        let order = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    let mut order_number = OrderNumber::generate();
                    while tx.order_number_exists(&order_number).await? {
                        order_number = OrderNumber::generate();
                    }

                    let order = Order::create(
                        order_id,
                        order_number,
                        customer_id,
                        totals,
                        shipping_address,
                        billing_address,
                        items,
                        order_expires_at,
                    )?;
                    tx.insert_order(&order).await?;

                    // Patch each reservation's reference from the
                    // placeholder to the real order id.
                    for item in order.items() {
                        let mut reservation = tx
                            .find_reservation(&item.reservation_key)
                            .await?
                            .ok_or_else(|| {
                                OrchestratorError::Store(StoreError::NotFound {
                                    entity: "inventory_reservation",
                                    id: item.reservation_key.to_string(),
                                })
                            })?;
                        reservation.reference_id = order_id.to_string();
                        tx.update_reservation(&reservation).await?;
                    }

                    Ok::<_, OrchestratorError>(order)
                })
            })
            .await?;

        // Phase 5: post-creation, best-effort. The order exists; nothing
        // here may revoke that. Payment initiation and the confirmation
        // notification ride the order.created event.
        self.bus.publish(DomainEvent::order_created(&order));
        self.audit.log_action(AuditEntry {
            entity_id: order.id().to_string(),
            action: "order.created".to_string(),
            actor_id: order.customer_id().to_string(),
            before: None,
            after: Some(serde_json::json!({
                "order_number": order.order_number().to_string(),
                "status": order.status().as_str(),
                "total": order.totals().total.minor(),
                "currency": order.totals().currency.code(),
            })),
            reason: None,
        });

        Ok(order)
    }

    /// Walks the rollback stack in reverse registration order.
    ///
    /// Individual failures are logged and tolerated so one bad rollback
    /// cannot block the rest.
    async fn compensate(&self, stack: CompensationStack) {
        if stack.is_empty() {
            return;
        }
        metrics::counter!("order_compensations_total").increment(1);
        for action in stack.unwind() {
            tracing::info!(%action, "rolling back");
            let result = match &action {
                CompensationAction::ReleaseReservation { key } => self
                    .engine
                    .release(key, "order-orchestrator", "order creation failed")
                    .await
                    .map(|_| ())
                    .map_err(OrchestratorError::from),
                CompensationAction::ReleasePriceLock { lock_id } => {
                    self.pricing.release_price_lock(lock_id).await
                }
            };
            if let Err(err) = result {
                metrics::counter!("order_compensation_failures_total").increment(1);
                tracing::error!(%action, %err, "compensation action failed");
            }
        }
    }

    /// Loads an order by id.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, OrchestratorError> {
        self.uow
            .serializable(move |tx| {
                Box::pin(async move { tx.find_order(id).await.map_err(OrchestratorError::from) })
            })
            .await
    }

    /// Auto-cancels pending orders past their payment deadline and
    /// releases their reservations, in a bounded batch.
    ///
    /// This is the expiry job phase 5 schedules; like the reservation
    /// sweep, per-order failures are collected, not fatal.
    #[tracing::instrument(skip(self))]
    pub async fn expire_overdue_orders(
        &self,
        limit: usize,
    ) -> Result<ExpiryReport, OrchestratorError> {
        let cutoff = Utc::now();
        let ids: Vec<OrderId> = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    tx.overdue_order_ids(cutoff, limit)
                        .await
                        .map_err(OrchestratorError::from)
                })
            })
            .await?;

        let mut report = ExpiryReport::default();
        for order_id in ids {
            match self.expire_one(order_id).await {
                Ok(()) => report.cancelled.push(order_id),
                Err(err) => {
                    tracing::warn!(%order_id, %err, "failed to expire order");
                    report.errors.push((order_id, err.to_string()));
                }
            }
        }
        if !report.cancelled.is_empty() {
            metrics::counter!("orders_expired_total").increment(report.cancelled.len() as u64);
            tracing::info!(cancelled = report.cancelled.len(), "overdue order sweep finished");
        }
        Ok(report)
    }

    async fn expire_one(&self, order_id: OrderId) -> Result<(), OrchestratorError> {
        let keys: Vec<ReservationKey> = self
            .uow
            .serializable(move |tx| {
                Box::pin(async move {
                    let mut order = tx.find_order(order_id).await?.ok_or_else(|| {
                        OrchestratorError::Store(StoreError::NotFound {
                            entity: "order",
                            id: order_id.to_string(),
                        })
                    })?;
                    if !order.is_expired(Utc::now()) {
                        // Raced with a payment; leave it alone.
                        return Ok::<_, OrchestratorError>(Vec::new());
                    }
                    order.cancel()?;
                    tx.update_order(&order).await?;
                    Ok(order
                        .items()
                        .iter()
                        .map(|item| item.reservation_key.clone())
                        .collect())
                })
            })
            .await?;

        for key in &keys {
            // The reservation sweep may have already resolved the hold.
            if let Err(err) = self.engine.release(key, "system", "order expired").await {
                tracing::debug!(reservation_key = %key, %err, "reservation not released during order expiry");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestedItem;
    use crate::services::{
        InMemoryAuditService, InMemoryPricingService, InMemoryValidationService,
    };
    use common::{Currency, CustomerId, Money, SellerId, VariantId};
    use domain::inventory::ReservationStatus;
    use domain::order::{Address, OrderStatus};
    use store::{MemoryStore, Outbox, OutboxDispatcher};

    type TestOrchestrator = OrderOrchestrator<
        MemoryStore,
        Outbox,
        InMemoryPricingService,
        InMemoryValidationService,
        InMemoryAuditService,
    >;

    struct Harness {
        orchestrator: TestOrchestrator,
        store: MemoryStore,
        pricing: InMemoryPricingService,
        validation: InMemoryValidationService,
        audit: InMemoryAuditService,
        dispatcher: OutboxDispatcher,
    }

    fn setup() -> Harness {
        let store = MemoryStore::new();
        let (outbox, dispatcher) = Outbox::bounded(64);
        let pricing = InMemoryPricingService::new();
        let validation = InMemoryValidationService::new();
        let audit = InMemoryAuditService::new();
        let orchestrator = OrderOrchestrator::new(
            store.clone(),
            outbox,
            pricing.clone(),
            validation.clone(),
            audit.clone(),
        );
        Harness {
            orchestrator,
            store,
            pricing,
            validation,
            audit,
            dispatcher,
        }
    }

    fn address() -> Address {
        Address {
            name: "Ada Lovelace".to_string(),
            line1: "1 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            postal_code: "EC1A 1AA".to_string(),
            country: "GB".to_string(),
        }
    }

    async fn seed_variant(harness: &Harness, available: i64, unit_price: i64) -> RequestedItem {
        let variant_id = VariantId::new();
        let seller_id = SellerId::new();
        harness
            .store
            .seed_inventory(variant_id, seller_id, available)
            .await;
        harness
            .pricing
            .set_price(variant_id, Money::from_minor(unit_price));
        RequestedItem {
            variant_id,
            seller_id,
            quantity: 1,
        }
    }

    fn request(items: Vec<RequestedItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: CustomerId::new(),
            currency: Currency::Usd,
            items,
            shipping_address: address(),
            billing_address: address(),
        }
    }

    #[tokio::test]
    async fn happy_path_creates_a_pending_order() {
        let mut harness = setup();
        harness.pricing.set_tax_rate_bps(1000);
        harness.pricing.set_shipping_flat(Money::from_minor(500));

        let mut item = seed_variant(&harness, 10, 2000).await;
        item.quantity = 2;
        let order = harness
            .orchestrator
            .create_order(request(vec![item.clone()]))
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.totals().subtotal, Money::from_minor(4000));
        assert_eq!(order.totals().tax, Money::from_minor(400));
        assert_eq!(order.totals().total, Money::from_minor(4900));

        // Ledger holds the stock.
        let record = harness
            .store
            .inventory_record(item.variant_id, item.seller_id)
            .await
            .unwrap();
        assert_eq!(record.available, 8);
        assert_eq!(record.reserved, 2);

        // The reservation now references the real order.
        let key = &order.items()[0].reservation_key;
        let reservation = harness.store.reservation(key).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Active);
        assert_eq!(reservation.reference_id, order.id().to_string());

        // Events: one reserve, then the order.created.
        let topics: Vec<&str> = harness
            .dispatcher
            .drain()
            .iter()
            .map(|e| e.topic())
            .collect();
        assert_eq!(topics, vec!["inventory.reserved", "order.created"]);

        // Audit captured the creation.
        assert_eq!(harness.audit.entry_count(), 1);
        assert_eq!(harness.audit.entries()[0].action, "order.created");

        // The price lock stays with the order.
        assert_eq!(harness.pricing.active_lock_count(), 1);
        assert_eq!(harness.pricing.released_lock_count(), 0);
    }

    #[tokio::test]
    async fn order_total_invariant_holds() {
        let harness = setup();
        harness.pricing.set_tax_rate_bps(825);
        harness.pricing.set_shipping_flat(Money::from_minor(799));
        harness.pricing.set_discount(Money::from_minor(250));

        let mut item = seed_variant(&harness, 5, 3333).await;
        item.quantity = 3;
        let order = harness
            .orchestrator
            .create_order(request(vec![item]))
            .await
            .unwrap();

        let totals = order.totals();
        let expected = totals.subtotal + totals.tax + totals.shipping - totals.discount;
        assert!(expected.abs_diff(totals.total) <= totals.currency.tolerance());
    }

    #[tokio::test]
    async fn failing_item_three_rolls_back_items_one_and_two() {
        let mut harness = setup();
        let item1 = seed_variant(&harness, 10, 1000).await;
        let item2 = seed_variant(&harness, 10, 1000).await;
        // Item 3 is priced but has only 1 unit in stock.
        let mut item3 = seed_variant(&harness, 1, 1000).await;
        item3.quantity = 5;

        let err = harness
            .orchestrator
            .create_order(request(vec![item1.clone(), item2.clone(), item3]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);

        // Both successful holds were released; availability is back to
        // the pre-attempt value.
        for item in [&item1, &item2] {
            let record = harness
                .store
                .inventory_record(item.variant_id, item.seller_id)
                .await
                .unwrap();
            assert_eq!(record.available, 10);
            assert_eq!(record.reserved, 0);
        }

        // No order exists, the price lock is gone, and order.failed
        // went out.
        assert_eq!(harness.store.order_count().await, 0);
        assert_eq!(harness.pricing.active_lock_count(), 0);
        assert_eq!(harness.pricing.released_lock_count(), 1);

        let topics: Vec<&str> = harness
            .dispatcher
            .drain()
            .iter()
            .map(|e| e.topic())
            .collect();
        assert_eq!(
            topics,
            vec![
                "inventory.reserved",
                "inventory.reserved",
                "inventory.released",
                "inventory.released",
                "order.failed"
            ]
        );
    }

    #[tokio::test]
    async fn validation_failure_aborts_before_any_side_effect() {
        let mut harness = setup();
        let item = seed_variant(&harness, 10, 1000).await;
        let req = request(vec![item.clone()]);
        harness.validation.block_customer(req.customer_id);

        let err = harness.orchestrator.create_order(req).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let record = harness
            .store
            .inventory_record(item.variant_id, item.seller_id)
            .await
            .unwrap();
        assert_eq!(record.available, 10);
        assert_eq!(harness.pricing.active_lock_count(), 0);
        assert_eq!(harness.pricing.released_lock_count(), 0);

        // Only the failure event fires.
        let topics: Vec<&str> = harness
            .dispatcher
            .drain()
            .iter()
            .map(|e| e.topic())
            .collect();
        assert_eq!(topics, vec!["order.failed"]);
    }

    #[tokio::test]
    async fn price_lock_failure_leaves_nothing_behind() {
        let harness = setup();
        let item = seed_variant(&harness, 10, 1000).await;
        harness.pricing.set_fail_on_lock(true);

        let err = harness
            .orchestrator
            .create_order(request(vec![item.clone()]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Pricing(_)));

        let record = harness
            .store
            .inventory_record(item.variant_id, item.seller_id)
            .await
            .unwrap();
        assert_eq!(record.reserved, 0);
        assert_eq!(harness.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn insufficient_stock_on_a_single_item() {
        let harness = setup();
        let mut item = seed_variant(&harness, 2, 1000).await;
        item.quantity = 3;

        let err = harness
            .orchestrator
            .create_order(request(vec![item]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert_eq!(harness.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn each_item_gets_a_distinct_reservation_key() {
        let harness = setup();
        let item1 = seed_variant(&harness, 10, 1000).await;
        let item2 = seed_variant(&harness, 10, 1000).await;

        let order = harness
            .orchestrator
            .create_order(request(vec![item1, item2]))
            .await
            .unwrap();

        let keys: Vec<_> = order
            .items()
            .iter()
            .map(|i| i.reservation_key.clone())
            .collect();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn overdue_pending_orders_are_cancelled_and_stock_returns() {
        let harness = setup();
        let orchestrator = harness
            .orchestrator
            .clone()
            .with_ttls(Duration::minutes(30), Duration::minutes(0));
        let item = seed_variant(&harness, 10, 1000).await;

        let order = orchestrator
            .create_order(request(vec![item.clone()]))
            .await
            .unwrap();

        let report = orchestrator.expire_overdue_orders(100).await.unwrap();
        assert_eq!(report.cancelled, vec![order.id()]);
        assert!(report.errors.is_empty());

        let stored = harness.store.order(order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);

        let record = harness
            .store
            .inventory_record(item.variant_id, item.seller_id)
            .await
            .unwrap();
        assert_eq!(record.available, 10);
        assert_eq!(record.reserved, 0);
    }

    #[tokio::test]
    async fn expiry_sweep_skips_paid_orders() {
        let harness = setup();
        let item = seed_variant(&harness, 10, 1000).await;
        let order = harness
            .orchestrator
            .create_order(request(vec![item]))
            .await
            .unwrap();

        let report = harness.orchestrator.expire_overdue_orders(100).await.unwrap();
        assert!(report.cancelled.is_empty());

        let stored = harness.store.order(order.id()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Pending);
    }
}
