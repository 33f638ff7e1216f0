//! Validation collaborator: structural and business-rule checks run
//! before any side effect exists.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::CustomerId;

use crate::error::OrchestratorError;
use crate::request::{CreateOrderRequest, RequestedItem};

/// Trait for the external validation system.
///
/// Each check either passes silently or fails with a descriptive reason.
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// Structural checks on the request itself.
    async fn validate_order_structure(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<(), OrchestratorError>;

    /// Customer existence and active-state check.
    async fn validate_customer(&self, customer_id: CustomerId) -> Result<(), OrchestratorError>;

    /// Variant existence and availability-for-sale check.
    async fn validate_variants(&self, items: &[RequestedItem]) -> Result<(), OrchestratorError>;

    /// Advisory stock pre-check; the reservation engine is still the
    /// authority.
    async fn validate_inventory_availability(
        &self,
        items: &[RequestedItem],
    ) -> Result<(), OrchestratorError>;

    /// Cross-cutting business rules (order limits, embargoes, ...).
    async fn validate_business_rules(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<(), OrchestratorError>;
}

#[derive(Debug, Default)]
struct ValidationState {
    blocked_customers: HashSet<CustomerId>,
    fail_on_variants: bool,
    fail_on_availability: bool,
    fail_on_business_rules: bool,
}

/// In-memory validation service for testing.
///
/// Structural checks are real; the external lookups (customer, variant,
/// availability, business rules) default to passing and can be flipped
/// to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryValidationService {
    state: Arc<RwLock<ValidationState>>,
}

impl InMemoryValidationService {
    /// Creates a permissive validation service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a customer as blocked/inactive.
    pub fn block_customer(&self, customer_id: CustomerId) {
        self.state
            .write()
            .unwrap()
            .blocked_customers
            .insert(customer_id);
    }

    /// Makes `validate_variants` fail.
    pub fn set_fail_on_variants(&self, fail: bool) {
        self.state.write().unwrap().fail_on_variants = fail;
    }

    /// Makes `validate_inventory_availability` fail.
    pub fn set_fail_on_availability(&self, fail: bool) {
        self.state.write().unwrap().fail_on_availability = fail;
    }

    /// Makes `validate_business_rules` fail.
    pub fn set_fail_on_business_rules(&self, fail: bool) {
        self.state.write().unwrap().fail_on_business_rules = fail;
    }
}

#[async_trait]
impl ValidationService for InMemoryValidationService {
    async fn validate_order_structure(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<(), OrchestratorError> {
        if request.items.is_empty() {
            return Err(OrchestratorError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &request.items {
            if item.quantity <= 0 {
                return Err(OrchestratorError::Validation(format!(
                    "quantity for variant {} must be positive, got {}",
                    item.variant_id, item.quantity
                )));
            }
        }
        if request.shipping_address.country.is_empty()
            || request.billing_address.country.is_empty()
        {
            return Err(OrchestratorError::Validation(
                "addresses must carry a country".to_string(),
            ));
        }
        Ok(())
    }

    async fn validate_customer(&self, customer_id: CustomerId) -> Result<(), OrchestratorError> {
        if self
            .state
            .read()
            .unwrap()
            .blocked_customers
            .contains(&customer_id)
        {
            return Err(OrchestratorError::Validation(format!(
                "customer {customer_id} is not active"
            )));
        }
        Ok(())
    }

    async fn validate_variants(&self, _items: &[RequestedItem]) -> Result<(), OrchestratorError> {
        if self.state.read().unwrap().fail_on_variants {
            return Err(OrchestratorError::Validation(
                "one or more variants are not available for sale".to_string(),
            ));
        }
        Ok(())
    }

    async fn validate_inventory_availability(
        &self,
        _items: &[RequestedItem],
    ) -> Result<(), OrchestratorError> {
        if self.state.read().unwrap().fail_on_availability {
            return Err(OrchestratorError::Validation(
                "requested quantities exceed advertised availability".to_string(),
            ));
        }
        Ok(())
    }

    async fn validate_business_rules(
        &self,
        _request: &CreateOrderRequest,
    ) -> Result<(), OrchestratorError> {
        if self.state.read().unwrap().fail_on_business_rules {
            return Err(OrchestratorError::Validation(
                "order violates a business rule".to_string(),
            ));
        }
        Ok(())
    }
}
