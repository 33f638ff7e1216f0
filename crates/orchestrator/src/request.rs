//! The order-creation request DTO.

use common::{Currency, CustomerId, SellerId, VariantId};
use domain::order::Address;
use serde::{Deserialize, Serialize};

/// One requested line: which variant, from which seller, how many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedItem {
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
}

/// Everything a caller supplies to create an order.
///
/// Prices are deliberately absent — the pricing collaborator computes
/// and locks them; a client can never dictate what it pays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub currency: Currency,
    pub items: Vec<RequestedItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
}
