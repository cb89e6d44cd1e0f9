use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::CartLine,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertCartRequest {
    pub owner_id: Uuid,
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CartItemInput {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(alias = "unit_price")]
    pub price: i64,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub fn ensure_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }
    Ok(())
}

impl CartItemInput {
    pub fn into_line(self) -> AppResult<CartLine> {
        ensure_quantity(self.quantity)?;
        if self.price < 0 {
            return Err(AppError::validation("Price cannot be negative"));
        }
        Ok(CartLine {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.price,
            name: self.name.filter(|name| !name.trim().is_empty()),
            image: self.image.filter(|image| !image.trim().is_empty()),
        })
    }
}
