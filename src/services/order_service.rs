use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record_admin_action,
    dto::orders::{
        CreateOrderRequest, OrderItemInput, OrderList, OrderReceipt, StatusUpdate,
        UpdateOrderStatusRequest, UpdatePaymentStatusRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{
        CustomerInfo, Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
        StatusTransition,
    },
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    state::AppState,
};

/// Check every submitted line and turn it into the snapshot stored with the order.
pub fn validate_lines(items: Vec<OrderItemInput>) -> AppResult<Vec<OrderLine>> {
    if items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }

    items
        .into_iter()
        .map(|item| {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(AppError::validation("Each item needs a product name"));
            }
            if item.quantity < 1 {
                return Err(AppError::validation("Quantity must be at least 1"));
            }
            if item.price < 0 {
                return Err(AppError::validation("Price cannot be negative"));
            }
            Ok(OrderLine {
                product_id: item.product_id,
                name: name.to_string(),
                quantity: item.quantity,
                unit_price: item.price,
                image: item.image.filter(|image| !image.trim().is_empty()),
            })
        })
        .collect()
}

pub fn order_total(lines: &[OrderLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |total, line| {
        line.unit_price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(|| AppError::validation("Order total is too large"))
    })
}

/// Plain-text summary for messaging apps: one numbered line per item, then the total.
pub fn render_summary(lines: &[OrderLine], total: i64) -> String {
    let mut summary = String::new();
    for (index, line) in lines.iter().enumerate() {
        let _ = writeln!(summary, "{}. {} x {}", index + 1, line.name, line.quantity);
    }
    let _ = write!(summary, "Total: Rs {total}");
    summary
}

pub async fn create_order(
    state: &AppState,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderReceipt>> {
    let lines = validate_lines(payload.items)?;
    let total_price = order_total(&lines)?;
    let summary_text = render_summary(&lines, total_price);
    let customer = payload.customer_info.unwrap_or_default();
    let payment_method = payload.payment_method.unwrap_or(PaymentMethod::Cod);
    let now = Utc::now();

    let txn = state.orm.begin().await?;
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        total_price: Set(total_price),
        summary_text: Set(summary_text),
        customer_name: Set(customer.name),
        customer_phone: Set(customer.phone),
        customer_email: Set(customer.email),
        customer_address: Set(customer.address),
        customer_notes: Set(customer.notes),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_method: Set(payment_method.as_str().to_string()),
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let rows = lines.iter().enumerate().map(|(position, line)| OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        position: Set(position as i32),
        product_id: Set(line.product_id),
        name: Set(line.name.clone()),
        quantity: Set(line.quantity),
        unit_price: Set(line.unit_price),
        image: Set(line.image.clone()),
    });
    OrderItems::insert_many(rows).exec_without_returning(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        lines = lines.len(),
        total_price,
        payment_method = %payment_method,
        "order created"
    );

    let receipt = OrderReceipt {
        order_id: order.id,
        total_price: order.total_price,
        summary_text: order.summary_text,
        status: OrderStatus::Pending,
        created_at: order.created_at.with_timezone(&Utc),
    };
    Ok(ApiResponse::success("Order created successfully", receipt, None))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    page_of_orders(state, status, query.pagination(), sort_order).await
}

pub async fn list_orders_by_status(
    state: &AppState,
    user: &AuthUser,
    status: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let status: OrderStatus = status.parse()?;
    page_of_orders(state, Some(status), pagination, SortOrder::Desc).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(order_not_found)?;
    let order = with_items(&state.orm, vec![order]).await?.remove(0);
    Ok(ApiResponse::success("Order", order, None))
}

/// Set the lifecycle status. Any of the six values is accepted; moves off the normal
/// fulfilment path are reported as overrides.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<StatusUpdate>> {
    ensure_admin(user)?;
    let next: OrderStatus = payload.status.trim().parse()?;

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(order_not_found)?;
    let previous: OrderStatus = stored(&existing.status)?;
    let transition = previous.transition_to(next);

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let saved = active.update(&txn).await?;
    let order = with_items(&txn, vec![saved]).await?.remove(0);
    txn.commit().await?;

    if transition == StatusTransition::Override {
        tracing::warn!(order_id = %id, from = %previous, to = %next, "order status overridden");
    } else {
        tracing::info!(order_id = %id, from = %previous, to = %next, "order status updated");
    }
    record_admin_action(
        &state.pool,
        user,
        "order_status_update",
        "orders",
        serde_json::json!({
            "order_id": id,
            "from": previous,
            "to": next,
            "transition": transition,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated successfully",
        StatusUpdate {
            order,
            previous_status: previous,
            transition,
        },
        None,
    ))
}

pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next: PaymentStatus = payload.payment_status.trim().parse()?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(order_not_found)?;

    let mut active: OrderActive = existing.into();
    active.payment_status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let saved = active.update(&state.orm).await?;
    let order = with_items(&state.orm, vec![saved]).await?.remove(0);

    record_admin_action(
        &state.pool,
        user,
        "order_payment_update",
        "orders",
        serde_json::json!({ "order_id": id, "payment_status": next }),
    )
    .await;

    Ok(ApiResponse::success("Payment status updated", order, None))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<()>> {
    ensure_admin(user)?;
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(order_not_found());
    }

    record_admin_action(
        &state.pool,
        user,
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::message("Order deleted successfully"))
}

async fn page_of_orders(
    state: &AppState,
    status: Option<OrderStatus>,
    pagination: Pagination,
    sort_order: SortOrder,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_items(&state.orm, rows).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

/// Load the line snapshots for a batch of orders in one query, keeping the input order.
async fn with_items<C: ConnectionTrait>(conn: &C, orders: Vec<OrderModel>) -> AppResult<Vec<Order>> {
    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();

    if !ids.is_empty() {
        let rows = OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(ids))
            .order_by_asc(OrderItemCol::OrderId)
            .order_by_asc(OrderItemCol::Position)
            .all(conn)
            .await?;
        for row in rows {
            lines.entry(row.order_id).or_default().push(line_from_entity(row));
        }
    }

    orders
        .into_iter()
        .map(|model| {
            let items = lines.remove(&model.id).unwrap_or_default();
            order_from_entity(model, items)
        })
        .collect()
}

fn order_not_found() -> AppError {
    AppError::not_found("Order not found")
}

fn stored<T: std::str::FromStr>(value: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("unexpected stored value {value:?}")))
}

fn order_from_entity(model: OrderModel, items: Vec<OrderLine>) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        items,
        total_price: model.total_price,
        summary_text: model.summary_text,
        customer_info: CustomerInfo {
            name: model.customer_name,
            phone: model.customer_phone,
            email: model.customer_email,
            address: model.customer_address,
            notes: model.customer_notes,
        },
        status: stored(&model.status)?,
        payment_method: stored(&model.payment_method)?,
        payment_status: stored(&model.payment_status)?,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn line_from_entity(model: OrderItemModel) -> OrderLine {
    OrderLine {
        product_id: model.product_id,
        name: model.name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        image: model.image,
    }
}
