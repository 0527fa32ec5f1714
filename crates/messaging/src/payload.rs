use serde::{Deserialize, Serialize};

use common::OrderId;

/// Catalog product reference carried in an order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub code: String,
    pub unit_value: f64,
}

/// One order line: a product and the quantity requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: Product,
    pub quantity: u32,
}

/// The order snapshot carried in every envelope.
///
/// Totals start unset and are filled in by the payment stage. Payload
/// mutations are additive: no stage may overwrite totals another stage
/// already wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub id: OrderId,
    pub products: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u32>,
}

impl OrderPayload {
    /// Creates a payload with no totals yet.
    pub fn new(id: OrderId, products: Vec<OrderItem>) -> Self {
        Self {
            id,
            products,
            total_amount: None,
            total_items: None,
        }
    }
}
