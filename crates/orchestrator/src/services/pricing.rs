//! Pricing collaborator: item pricing, taxes, shipping, discounts, and
//! price locks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CustomerId, Money, SellerId, VariantId};
use domain::order::{Address, ProductSnapshot};

use crate::error::OrchestratorError;
use crate::request::RequestedItem;

/// One request line after pricing: the unit price and the catalog
/// snapshot frozen for the order item.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    pub snapshot: ProductSnapshot,
}

/// A logical lock on a computed order total.
///
/// Not a database lock: it pins the total against concurrent promotion
/// or price changes until the order is persisted.
#[derive(Debug, Clone)]
pub struct PriceLock {
    pub lock_id: String,
    pub final_total: Money,
}

/// Trait for the external pricing system.
#[async_trait]
pub trait PricingService: Send + Sync {
    /// Prices each requested item and returns its frozen catalog snapshot.
    async fn calculate_item_pricing(
        &self,
        items: &[RequestedItem],
        customer_id: CustomerId,
    ) -> Result<Vec<PricedItem>, OrchestratorError>;

    /// Computes taxes for the priced items shipped to the given address.
    async fn calculate_taxes(
        &self,
        items: &[PricedItem],
        shipping_address: &Address,
    ) -> Result<Money, OrchestratorError>;

    /// Computes the shipping cost.
    async fn calculate_shipping(
        &self,
        items: &[PricedItem],
        shipping_address: &Address,
    ) -> Result<Money, OrchestratorError>;

    /// Computes the discount to subtract from the total.
    async fn apply_discounts(
        &self,
        subtotal: Money,
        customer_id: CustomerId,
    ) -> Result<Money, OrchestratorError>;

    /// Locks the computed total against concurrent price changes.
    async fn lock_prices(
        &self,
        customer_id: CustomerId,
        total: Money,
    ) -> Result<PriceLock, OrchestratorError>;

    /// Releases a previously taken price lock.
    async fn release_price_lock(&self, lock_id: &str) -> Result<(), OrchestratorError>;
}

#[derive(Debug, Default)]
struct PricingState {
    prices: HashMap<VariantId, Money>,
    names: HashMap<VariantId, String>,
    tax_rate_bps: i64,
    shipping_flat: Money,
    discount: Money,
    locks: HashMap<String, Money>,
    released_locks: Vec<String>,
    next_lock: u32,
    fail_on_pricing: bool,
    fail_on_lock: bool,
}

/// In-memory pricing service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPricingService {
    state: Arc<RwLock<PricingState>>,
}

impl InMemoryPricingService {
    /// Creates a pricing service with no prices, no tax, no shipping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unit price for a variant.
    pub fn set_price(&self, variant_id: VariantId, unit_price: Money) {
        let mut state = self.state.write().unwrap();
        state.prices.insert(variant_id, unit_price);
    }

    /// Sets the display name used in the variant's snapshot.
    pub fn set_name(&self, variant_id: VariantId, name: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .names
            .insert(variant_id, name.into());
    }

    /// Sets the tax rate in basis points (875 = 8.75%).
    pub fn set_tax_rate_bps(&self, bps: i64) {
        self.state.write().unwrap().tax_rate_bps = bps;
    }

    /// Sets the flat shipping cost.
    pub fn set_shipping_flat(&self, amount: Money) {
        self.state.write().unwrap().shipping_flat = amount;
    }

    /// Sets the discount returned by `apply_discounts`.
    pub fn set_discount(&self, amount: Money) {
        self.state.write().unwrap().discount = amount;
    }

    /// Makes `calculate_item_pricing` fail.
    pub fn set_fail_on_pricing(&self, fail: bool) {
        self.state.write().unwrap().fail_on_pricing = fail;
    }

    /// Makes `lock_prices` fail.
    pub fn set_fail_on_lock(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lock = fail;
    }

    /// Number of currently held locks.
    pub fn active_lock_count(&self) -> usize {
        self.state.read().unwrap().locks.len()
    }

    /// Number of locks that were released.
    pub fn released_lock_count(&self) -> usize {
        self.state.read().unwrap().released_locks.len()
    }
}

#[async_trait]
impl PricingService for InMemoryPricingService {
    async fn calculate_item_pricing(
        &self,
        items: &[RequestedItem],
        _customer_id: CustomerId,
    ) -> Result<Vec<PricedItem>, OrchestratorError> {
        let state = self.state.read().unwrap();
        if state.fail_on_pricing {
            return Err(OrchestratorError::Pricing(
                "pricing backend unavailable".to_string(),
            ));
        }

        items
            .iter()
            .map(|item| {
                let unit_price = state.prices.get(&item.variant_id).copied().ok_or_else(|| {
                    OrchestratorError::Pricing(format!("no price for variant {}", item.variant_id))
                })?;
                let name = state
                    .names
                    .get(&item.variant_id)
                    .cloned()
                    .unwrap_or_else(|| format!("Variant {}", item.variant_id));
                Ok(PricedItem {
                    variant_id: item.variant_id,
                    seller_id: item.seller_id,
                    quantity: item.quantity,
                    unit_price,
                    total_price: unit_price.multiply(item.quantity),
                    snapshot: ProductSnapshot {
                        product_name: name.clone(),
                        variant_name: name,
                        brand_name: None,
                        category_name: None,
                        seller_name: format!("Seller {}", item.seller_id),
                        attributes: Default::default(),
                    },
                })
            })
            .collect()
    }

    async fn calculate_taxes(
        &self,
        items: &[PricedItem],
        _shipping_address: &Address,
    ) -> Result<Money, OrchestratorError> {
        let state = self.state.read().unwrap();
        let subtotal: Money = items.iter().map(|i| i.total_price).sum();
        Ok(Money::from_minor(
            subtotal.minor() * state.tax_rate_bps / 10_000,
        ))
    }

    async fn calculate_shipping(
        &self,
        items: &[PricedItem],
        _shipping_address: &Address,
    ) -> Result<Money, OrchestratorError> {
        if items.is_empty() {
            return Ok(Money::zero());
        }
        Ok(self.state.read().unwrap().shipping_flat)
    }

    async fn apply_discounts(
        &self,
        _subtotal: Money,
        _customer_id: CustomerId,
    ) -> Result<Money, OrchestratorError> {
        Ok(self.state.read().unwrap().discount)
    }

    async fn lock_prices(
        &self,
        _customer_id: CustomerId,
        total: Money,
    ) -> Result<PriceLock, OrchestratorError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_lock {
            return Err(OrchestratorError::Pricing(
                "price lock unavailable".to_string(),
            ));
        }
        state.next_lock += 1;
        let lock_id = format!("LOCK-{:04}", state.next_lock);
        state.locks.insert(lock_id.clone(), total);
        Ok(PriceLock {
            lock_id,
            final_total: total,
        })
    }

    async fn release_price_lock(&self, lock_id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().unwrap();
        state.locks.remove(lock_id);
        state.released_locks.push(lock_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SellerId;

    fn requested(variant_id: VariantId, quantity: i64) -> RequestedItem {
        RequestedItem {
            variant_id,
            seller_id: SellerId::new(),
            quantity,
        }
    }

    #[tokio::test]
    async fn prices_and_snapshots_come_from_the_catalog() {
        let pricing = InMemoryPricingService::new();
        let variant_id = VariantId::new();
        pricing.set_price(variant_id, Money::from_minor(1250));
        pricing.set_name(variant_id, "Trail Shoe 42");

        let priced = pricing
            .calculate_item_pricing(&[requested(variant_id, 2)], CustomerId::new())
            .await
            .unwrap();

        assert_eq!(priced[0].unit_price, Money::from_minor(1250));
        assert_eq!(priced[0].total_price, Money::from_minor(2500));
        assert_eq!(priced[0].snapshot.product_name, "Trail Shoe 42");
    }

    #[tokio::test]
    async fn unpriced_variant_fails() {
        let pricing = InMemoryPricingService::new();
        let result = pricing
            .calculate_item_pricing(&[requested(VariantId::new(), 1)], CustomerId::new())
            .await;
        assert!(matches!(result, Err(OrchestratorError::Pricing(_))));
    }

    #[tokio::test]
    async fn tax_uses_basis_points() {
        let pricing = InMemoryPricingService::new();
        let variant_id = VariantId::new();
        pricing.set_price(variant_id, Money::from_minor(10_000));
        pricing.set_tax_rate_bps(875);

        let priced = pricing
            .calculate_item_pricing(&[requested(variant_id, 1)], CustomerId::new())
            .await
            .unwrap();
        let tax = pricing
            .calculate_taxes(
                &priced,
                &Address {
                    name: String::new(),
                    line1: String::new(),
                    line2: None,
                    city: String::new(),
                    postal_code: String::new(),
                    country: "US".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(tax, Money::from_minor(875));
    }

    #[tokio::test]
    async fn locks_are_tracked_and_released() {
        let pricing = InMemoryPricingService::new();
        let lock = pricing
            .lock_prices(CustomerId::new(), Money::from_minor(5000))
            .await
            .unwrap();
        assert_eq!(pricing.active_lock_count(), 1);

        pricing.release_price_lock(&lock.lock_id).await.unwrap();
        assert_eq!(pricing.active_lock_count(), 0);
        assert_eq!(pricing.released_lock_count(), 1);
    }
}
