//! Status enums for orders, payments, notifications, and stock levels.

use serde::{Deserialize, Serialize};

/// Stock drops into the "low" band at or below this many units.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Order lifecycle status as reported by the commerce API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// Category of a merchant notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A new order came in.
    Order,
    /// Inventory ran low or out.
    Stock,
    /// Platform-level message.
    System,
}

impl NotificationKind {
    /// Stable string form, as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Stock => "stock",
            Self::System => "system",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order" => Some(Self::Order),
            "stock" => Some(Self::Stock),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock badge band for a product, derived from available units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    OutOfStock,
    Low,
    InStock,
}

impl StockLevel {
    /// Classify an available-unit count.
    #[must_use]
    pub const fn from_units(units: u32) -> Self {
        match units {
            0 => Self::OutOfStock,
            1..=LOW_STOCK_THRESHOLD => Self::Low,
            _ => Self::InStock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_level_bands() {
        assert_eq!(StockLevel::from_units(0), StockLevel::OutOfStock);
        assert_eq!(StockLevel::from_units(1), StockLevel::Low);
        assert_eq!(StockLevel::from_units(5), StockLevel::Low);
        assert_eq!(StockLevel::from_units(6), StockLevel::InStock);
    }

    #[test]
    fn test_notification_kind_round_trip() {
        for kind in [
            NotificationKind::Order,
            NotificationKind::Stock,
            NotificationKind::System,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("billing"), None);
    }

    #[test]
    fn test_order_status_serde_names() {
        let json = serde_json::to_string(&OrderStatus::Pending).expect("serialize");
        assert_eq!(json, "\"pending\"");
    }
}
