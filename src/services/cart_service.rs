//! Per-owner carts.
//!
//! Every mutation runs inside one transaction holding a row lock on the owner's cart, so
//! concurrent writes for the same owner serialize instead of overwriting each other. The
//! stored totals are recomputed from the item list on every write and an empty cart is
//! deleted rather than kept around.

use chrono::Utc;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::cart::{CartItemInput, ensure_quantity},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{Cart, CartItem, CartLine},
    response::ApiResponse,
    services::product_service,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub total_items: i64,
    pub total_price: i64,
}

/// The ordered line list of one cart. Product ids are unique within it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartContents {
    lines: Vec<CartLine>,
}

impl CartContents {
    /// Lines read back from storage, already unique by product.
    pub fn from_stored(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// A full client-supplied list. Repeated products are merged into the first
    /// occurrence with their quantities summed.
    pub fn from_submission(lines: Vec<CartLine>) -> AppResult<Self> {
        let mut contents = Self::default();
        for line in lines {
            contents.add(line)?;
        }
        Ok(contents)
    }

    /// Add a line, or increase the quantity of the existing line for the same product.
    pub fn add(&mut self, line: CartLine) -> AppResult<()> {
        ensure_quantity(line.quantity)?;
        match self.position(line.product_id) {
            Some(index) => {
                let existing = &mut self.lines[index];
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::validation("Quantity is too large"))?;
            }
            None => self.lines.push(line),
        }
        Ok(())
    }

    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32) -> AppResult<()> {
        ensure_quantity(quantity)?;
        let index = self
            .position(product_id)
            .ok_or_else(|| AppError::not_found("Product not found in cart"))?;
        self.lines[index].quantity = quantity;
        Ok(())
    }

    pub fn remove(&mut self, product_id: Uuid) -> AppResult<()> {
        let index = self
            .position(product_id)
            .ok_or_else(|| AppError::not_found("Product not found in cart"))?;
        self.lines.remove(index);
        Ok(())
    }

    pub fn totals(&self) -> AppResult<CartTotals> {
        let overflow = || AppError::validation("Cart total is too large");
        let mut totals = CartTotals {
            total_items: 0,
            total_price: 0,
        };
        for line in &self.lines {
            let quantity = i64::from(line.quantity);
            let subtotal = line.unit_price.checked_mul(quantity).ok_or_else(overflow)?;
            totals.total_items = totals.total_items.checked_add(quantity).ok_or_else(overflow)?;
            totals.total_price = totals.total_price.checked_add(subtotal).ok_or_else(overflow)?;
        }
        Ok(totals)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn position(&self, product_id: Uuid) -> Option<usize> {
        self.lines.iter().position(|line| line.product_id == product_id)
    }
}

enum CartWrite {
    Saved(CartModel),
    Deleted { owner_id: Uuid },
}

pub async fn get_cart(state: &AppState, user: &AuthUser, owner_id: Uuid) -> AppResult<Option<Cart>> {
    ensure_owner_or_admin(user, owner_id)?;

    let Some(cart) = Carts::find()
        .filter(CartCol::OwnerId.eq(owner_id))
        .one(&state.orm)
        .await?
    else {
        return Ok(None);
    };

    let lines = load_lines(&state.orm, cart.id).await?;
    Ok(Some(cart_view(&state.orm, cart, lines).await?))
}

/// Replace the whole item list of the owner's cart, creating the cart if needed.
pub async fn upsert_cart(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
    items: Vec<CartItemInput>,
) -> AppResult<ApiResponse<Cart>> {
    ensure_owner_or_admin(user, owner_id)?;
    let lines = items
        .into_iter()
        .map(CartItemInput::into_line)
        .collect::<AppResult<Vec<_>>>()?;
    let contents = CartContents::from_submission(lines)?;

    let txn = state.orm.begin().await?;
    let (cart, created) = lock_or_create_cart(&txn, owner_id).await?;
    let write = persist(&txn, cart, &contents).await?;
    txn.commit().await?;

    let message = if created {
        "Cart created successfully"
    } else {
        "Cart updated successfully"
    };
    respond(state, write, contents, message).await
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
    item: CartItemInput,
) -> AppResult<ApiResponse<Cart>> {
    ensure_owner_or_admin(user, owner_id)?;
    let line = item.into_line()?;

    let txn = state.orm.begin().await?;
    let (cart, _) = lock_or_create_cart(&txn, owner_id).await?;
    let mut contents = CartContents::from_stored(load_lines(&txn, cart.id).await?);
    contents.add(line)?;
    let write = persist(&txn, cart, &contents).await?;
    txn.commit().await?;

    respond(state, write, contents, "Item added to cart").await
}

pub async fn update_item_quantity(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<ApiResponse<Cart>> {
    ensure_owner_or_admin(user, owner_id)?;
    ensure_quantity(quantity)?;

    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, owner_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;
    let mut contents = CartContents::from_stored(load_lines(&txn, cart.id).await?);
    contents.set_quantity(product_id, quantity)?;
    let write = persist(&txn, cart, &contents).await?;
    txn.commit().await?;

    respond(state, write, contents, "Cart item updated").await
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
    product_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    ensure_owner_or_admin(user, owner_id)?;

    let txn = state.orm.begin().await?;
    let cart = lock_cart(&txn, owner_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;
    let mut contents = CartContents::from_stored(load_lines(&txn, cart.id).await?);
    contents.remove(product_id)?;
    let write = persist(&txn, cart, &contents).await?;
    txn.commit().await?;

    respond(state, write, contents, "Item removed from cart").await
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
    owner_id: Uuid,
) -> AppResult<ApiResponse<()>> {
    ensure_owner_or_admin(user, owner_id)?;

    let result = Carts::delete_many()
        .filter(CartCol::OwnerId.eq(owner_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart not found"));
    }

    tracing::info!(owner_id = %owner_id, "cart cleared");
    Ok(ApiResponse::message("Cart cleared successfully"))
}

async fn lock_cart(txn: &DatabaseTransaction, owner_id: Uuid) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::OwnerId.eq(owner_id))
        .lock(LockType::Update)
        .one(txn)
        .await?)
}

/// Lock the owner's cart row, inserting an empty one first if none exists. The boolean
/// reports whether this call created it.
async fn lock_or_create_cart(
    txn: &DatabaseTransaction,
    owner_id: Uuid,
) -> AppResult<(CartModel, bool)> {
    if let Some(cart) = lock_cart(txn, owner_id).await? {
        return Ok((cart, false));
    }

    let now = Utc::now();
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        total_items: Set(0),
        total_price: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    })
    .on_conflict(OnConflict::column(CartCol::OwnerId).do_nothing().to_owned())
    .exec_without_returning(txn)
    .await
    .map_err(owner_error)?;

    // A concurrent writer may have won the insert; either way the row exists now.
    let cart = lock_cart(txn, owner_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart row missing after insert")))?;
    Ok((cart, true))
}

fn owner_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::not_found("Owner not found"),
        _ => AppError::OrmError(err),
    }
}

async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Vec<CartLine>> {
    Ok(CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| CartLine {
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            name: row.name,
            image: row.image,
        })
        .collect())
}

/// Write the item list and recomputed totals, or delete the cart when nothing is left.
async fn persist(
    txn: &DatabaseTransaction,
    cart: CartModel,
    contents: &CartContents,
) -> AppResult<CartWrite> {
    if contents.is_empty() {
        Carts::delete_by_id(cart.id).exec(txn).await?;
        tracing::info!(owner_id = %cart.owner_id, "cart emptied and removed");
        return Ok(CartWrite::Deleted {
            owner_id: cart.owner_id,
        });
    }

    let totals = contents.totals()?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(txn)
        .await?;
    let rows = contents
        .lines()
        .iter()
        .enumerate()
        .map(|(position, line)| CartItemActive {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            position: Set(position as i32),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            name: Set(line.name.clone()),
            image: Set(line.image.clone()),
        });
    CartItems::insert_many(rows).exec_without_returning(txn).await?;

    let mut active: CartActive = cart.into();
    active.total_items = Set(totals.total_items);
    active.total_price = Set(totals.total_price);
    active.updated_at = Set(Utc::now().into());
    let saved = active.update(txn).await?;

    tracing::debug!(
        owner_id = %saved.owner_id,
        lines = contents.lines().len(),
        total_items = totals.total_items,
        total_price = totals.total_price,
        "cart saved"
    );
    Ok(CartWrite::Saved(saved))
}

async fn respond(
    state: &AppState,
    write: CartWrite,
    contents: CartContents,
    message: &str,
) -> AppResult<ApiResponse<Cart>> {
    match write {
        CartWrite::Saved(cart) => {
            let view = cart_view(&state.orm, cart, contents.lines).await?;
            Ok(ApiResponse::success(message, view, None))
        }
        CartWrite::Deleted { owner_id } => Ok(ApiResponse::success(
            "Cart is now empty",
            Cart::empty(owner_id),
            None,
        )),
    }
}

/// Attach live product details to each line. Lines whose product is gone keep their
/// snapshot fields and carry no product.
async fn cart_view(db: &OrmConn, cart: CartModel, lines: Vec<CartLine>) -> AppResult<Cart> {
    let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    let mut products = product_service::summaries(db, &ids).await?;

    let items = lines
        .into_iter()
        .map(|line| CartItem {
            product: products.remove(&line.product_id),
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            name: line.name,
            image: line.image,
        })
        .collect();

    Ok(Cart {
        id: Some(cart.id),
        owner_id: cart.owner_id,
        items,
        total_items: cart.total_items,
        total_price: cart.total_price,
        created_at: Some(cart.created_at.with_timezone(&Utc)),
        updated_at: Some(cart.updated_at.with_timezone(&Utc)),
    })
}
