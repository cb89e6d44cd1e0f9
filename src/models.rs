use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Declares a closed set of lowercase string values stored in text columns.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(AppError::Validation(format!(
                        "Invalid {}. Must be one of: {}",
                        $label,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Which identity table a session token belongs to.
    Role, "role" {
        Shopper => "shopper",
        Admin => "admin",
    }
);

text_enum!(
    /// How a shopper identity was created.
    Provider, "provider" {
        Local => "local",
        Google => "google",
    }
);

text_enum!(
    OrderStatus, "status" {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

text_enum!(
    PaymentMethod, "payment method" {
        Cash => "cash",
        Card => "card",
        Online => "online",
        Cod => "cod",
    }
);

text_enum!(
    PaymentStatus, "payment status" {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
);

/// How a status change relates to the normal fulfilment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusTransition {
    Unchanged,
    Forward,
    Override,
}

impl OrderStatus {
    /// The fulfilment graph: one step forward, or cancellation before shipping.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
        )
    }

    pub fn transition_to(self, next: OrderStatus) -> StatusTransition {
        if self == next {
            StatusTransition::Unchanged
        } else if self.can_advance_to(next) {
            StatusTransition::Forward
        } else {
            StatusTransition::Override
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub provider: Provider,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductImage {
    pub external_id: String,
    pub url: String,
    pub alt_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub stock: i32,
    pub category: String,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live catalog details shown next to a cart line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub price: i64,
    pub image: Option<String>,
}

/// One product line inside a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub name: Option<String>,
    pub image: Option<String>,
    pub product: Option<ProductSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Cart {
    pub id: Option<Uuid>,
    pub owner_id: Uuid,
    pub items: Vec<CartItem>,
    pub total_items: i64,
    pub total_price: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// The shape reported for an owner that has no stored cart.
    pub fn empty(owner_id: Uuid) -> Self {
        Self {
            id: None,
            owner_id,
            items: Vec::new(),
            total_items: 0,
            total_price: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Snapshot of a product line taken when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub items: Vec<OrderLine>,
    pub total_price: i64,
    pub summary_text: String,
    pub customer_info: CustomerInfo,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_parses_from_its_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert_eq!(OrderStatus::ALL.len(), 6);
    }

    #[test]
    fn unknown_status_lists_the_allowed_values() {
        let err = "lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status. Must be one of: pending, confirmed, processing, shipped, delivered, cancelled"
        );
    }

    #[test]
    fn payment_values_are_closed_sets() {
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert!("cheque".parse::<PaymentMethod>().is_err());
        assert_eq!("refunded".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
        assert!("PAID".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn fulfilment_path_is_forward() {
        use OrderStatus::*;
        assert_eq!(Pending.transition_to(Confirmed), StatusTransition::Forward);
        assert_eq!(Shipped.transition_to(Delivered), StatusTransition::Forward);
        assert_eq!(Processing.transition_to(Cancelled), StatusTransition::Forward);
        assert_eq!(Pending.transition_to(Pending), StatusTransition::Unchanged);
    }

    #[test]
    fn skips_and_reversals_are_overrides() {
        use OrderStatus::*;
        assert_eq!(Pending.transition_to(Delivered), StatusTransition::Override);
        assert_eq!(Delivered.transition_to(Pending), StatusTransition::Override);
        assert_eq!(Shipped.transition_to(Cancelled), StatusTransition::Override);
        assert_eq!(Cancelled.transition_to(Confirmed), StatusTransition::Override);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Shopper).unwrap(), "\"shopper\"");
        assert_eq!(serde_json::to_string(&Provider::Google).unwrap(), "\"google\"");
        assert_eq!(
            serde_json::to_string(&StatusTransition::Override).unwrap(),
            "\"override\""
        );
    }
}
