//! Orders (`orders`) and their line snapshots (`order_items`).

use chrono::{DateTime, Utc};
use numisma_core::{CoinId, OrderId, OrderItemId, OrderStatus, PhoneNumber, Price, ProfileId};
use serde::{Deserialize, Serialize};

/// Delivery address, stored as a JSON column on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub phone: PhoneNumber,
}

fn default_country() -> String {
    "India".to_string()
}

impl ShippingAddress {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: ProfileId,
    pub status: OrderStatus,
    pub total: Price,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a listing at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub coin_id: CoinId,
    pub title: String,
    pub price: Price,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: ProfileId,
    pub status: OrderStatus,
    pub total: Price,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub coin_id: CoinId,
    pub title: String,
    pub price: Price,
    pub quantity: u32,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields() {
        let address = ShippingAddress {
            full_name: "Asha Rao".to_string(),
            line1: " ".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: String::new(),
            postal_code: "411001".to_string(),
            country: default_country(),
            phone: PhoneNumber::parse("9876543210").unwrap(),
        };
        assert_eq!(address.missing_fields(), vec!["line1", "state"]);
    }
}
