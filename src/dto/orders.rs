use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CustomerInfo, Order, OrderStatus, PaymentMethod, StatusTransition};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    #[serde(alias = "unit_price")]
    pub price: i64,
    pub image: Option<String>,
}

/// What the shopper gets back after placing an order.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub total_price: i64,
    pub summary_text: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdate {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub transition: StatusTransition,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
