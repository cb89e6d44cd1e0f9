mod common;

use storefront_api::{
    dto::{
        cart::CartItemInput,
        orders::{
            CreateOrderRequest, OrderItemInput, StatusUpdate, UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
        },
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{CustomerInfo, OrderStatus, PaymentMethod, PaymentStatus, StatusTransition},
    response::ApiResponse,
    routes::params::Pagination,
    services::{cart_service, order_service},
    state::AppState,
};
use uuid::Uuid;

fn cart_item(product_id: Uuid, quantity: i32, price: i64, name: &str) -> CartItemInput {
    CartItemInput {
        product_id,
        quantity,
        price,
        name: Some(name.to_string()),
        image: None,
    }
}

// Shopper fills a cart, places an order from it, admin moves the order along.
#[tokio::test]
async fn cart_to_order_flow() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let shopper = common::register_shopper(&state, "buyer").await?;
    let owner = shopper.user_id;
    let shoe = Uuid::new_v4();
    let sock = Uuid::new_v4();

    let created = cart_service::add_item(&state, &shopper, owner, cart_item(shoe, 1, 50, "Shoe")).await?;
    assert_eq!(created.message, "Item added to cart");

    let cart = cart_service::add_item(&state, &shopper, owner, cart_item(shoe, 1, 50, "Shoe"))
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.total_price, 100);

    cart_service::add_item(&state, &shopper, owner, cart_item(sock, 3, 20, "Sock")).await?;
    let cart = cart_service::update_item_quantity(&state, &shopper, owner, sock, 1)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.total_items, 3);
    assert_eq!(cart.total_price, 120);

    let stored = cart_service::get_cart(&state, &shopper, owner)
        .await?
        .expect("stored cart");
    assert_eq!(stored.total_price, 120);
    assert!(stored.items.iter().all(|item| item.product.is_none()));

    let items = stored
        .items
        .iter()
        .map(|item| OrderItemInput {
            product_id: item.product_id,
            name: item.name.clone().unwrap_or_default(),
            quantity: item.quantity,
            price: item.unit_price,
            image: item.image.clone(),
        })
        .collect();
    let receipt = order_service::create_order(
        &state,
        CreateOrderRequest {
            items,
            customer_info: Some(CustomerInfo {
                name: Some("Buyer".into()),
                phone: Some("+92 300 0000000".into()),
                ..CustomerInfo::default()
            }),
            payment_method: None,
        },
    )
    .await?
    .data
    .expect("receipt");
    assert_eq!(receipt.total_price, 120);
    assert_eq!(receipt.status, OrderStatus::Pending);
    assert_eq!(receipt.summary_text, "1. Shoe x 2\n2. Sock x 1\nTotal: Rs 120");

    cart_service::clear_cart(&state, &shopper, owner).await?;
    assert!(cart_service::get_cart(&state, &shopper, owner).await?.is_none());

    let admin = common::admin();
    let order = order_service::get_order(&state, &admin, receipt.order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.customer_info.name.as_deref(), Some("Buyer"));

    let update = order_service::update_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "confirmed".into(),
        },
    )
    .await?
    .data
    .expect("status update");
    assert_eq!(update.transition, StatusTransition::Forward);
    assert_eq!(update.order.status, OrderStatus::Confirmed);

    let update = order_service::update_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "pending".into(),
        },
    )
    .await?
    .data
    .expect("status update");
    assert_eq!(update.previous_status, OrderStatus::Confirmed);
    assert_eq!(update.transition, StatusTransition::Override);

    let paid = order_service::update_payment_status(
        &state,
        &admin,
        order.id,
        UpdatePaymentStatusRequest {
            payment_status: "paid".into(),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let pending = order_service::list_orders_by_status(
        &state,
        &admin,
        "pending",
        Pagination {
            page: Some(1),
            per_page: Some(100),
        },
    )
    .await?;
    assert!(pending.meta.is_some());

    order_service::delete_order(&state, &admin, order.id).await?;
    let gone = order_service::get_order(&state, &admin, order.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn invalid_status_is_rejected() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let receipt = order_service::create_order(
        &state,
        CreateOrderRequest {
            items: vec![OrderItemInput {
                product_id: Uuid::new_v4(),
                name: "Cap".into(),
                quantity: 1,
                price: 300,
                image: None,
            }],
            customer_info: None,
            payment_method: Some(PaymentMethod::Online),
        },
    )
    .await?
    .data
    .expect("receipt");

    let result = order_service::update_status(
        &state,
        &common::admin(),
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: "lost".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn upsert_replaces_items_and_empty_list_deletes_cart() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let shopper = common::register_shopper(&state, "upserter").await?;
    let owner = shopper.user_id;
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let first = cart_service::upsert_cart(
        &state,
        &shopper,
        owner,
        vec![cart_item(a, 1, 10, "A"), cart_item(b, 2, 5, "B"), cart_item(a, 2, 10, "A")],
    )
    .await?;
    assert_eq!(first.message, "Cart created successfully");
    let cart = first.data.expect("cart");
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].product_id, a);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.total_price, 40);

    let second = cart_service::upsert_cart(&state, &shopper, owner, vec![cart_item(b, 1, 5, "B")])
        .await?;
    assert_eq!(second.message, "Cart updated successfully");
    assert_eq!(second.data.expect("cart").total_items, 1);

    let emptied = cart_service::upsert_cart(&state, &shopper, owner, Vec::new()).await?;
    assert_eq!(emptied.message, "Cart is now empty");
    assert!(cart_service::get_cart(&state, &shopper, owner).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn removing_last_item_deletes_cart() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let shopper = common::register_shopper(&state, "remover").await?;
    let owner = shopper.user_id;
    let only = Uuid::new_v4();

    cart_service::add_item(&state, &shopper, owner, cart_item(only, 1, 99, "Only")).await?;

    let missing = cart_service::remove_item(&state, &shopper, owner, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let resp = cart_service::remove_item(&state, &shopper, owner, only).await?;
    let cart = resp.data.expect("empty cart shape");
    assert!(cart.id.is_none());
    assert!(cart.items.is_empty());

    assert!(cart_service::get_cart(&state, &shopper, owner).await?.is_none());
    let cleared = cart_service::clear_cart(&state, &shopper, owner).await;
    assert!(matches!(cleared, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn cart_access_is_limited_to_owner_or_admin() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let alice = common::register_shopper(&state, "alice").await?;
    let bob = common::register_shopper(&state, "bob").await?;

    let foreign = cart_service::add_item(
        &state,
        &bob,
        alice.user_id,
        cart_item(Uuid::new_v4(), 1, 10, "Pen"),
    )
    .await;
    assert!(matches!(foreign, Err(AppError::Forbidden)));

    let admin = common::admin();
    cart_service::add_item(&state, &admin, alice.user_id, cart_item(Uuid::new_v4(), 1, 10, "Pen"))
        .await?;
    assert!(cart_service::get_cart(&state, &alice, alice.user_id).await?.is_some());

    let unknown = cart_service::add_item(
        &state,
        &admin,
        Uuid::new_v4(),
        cart_item(Uuid::new_v4(), 1, 10, "Pen"),
    )
    .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_for_one_owner_are_not_lost() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let shopper = common::register_shopper(&state, "racer").await?;
    let owner = shopper.user_id;
    let product = Uuid::new_v4();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let state = state.clone();
        let shopper = shopper.clone();
        tasks.push(tokio::spawn(async move {
            cart_service::add_item(&state, &shopper, owner, cart_item(product, 1, 10, "Mug")).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    let cart = cart_service::get_cart(&state, &shopper, owner)
        .await?
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_items, 5);
    assert_eq!(cart.total_price, 50);
    Ok(())
}

#[tokio::test]
async fn every_status_is_accepted_from_every_prior_status() -> anyhow::Result<()> {
    let Some(state) = common::test_state().await? else {
        return Ok(());
    };
    let admin = common::admin();
    let receipt = order_service::create_order(
        &state,
        CreateOrderRequest {
            items: vec![OrderItemInput {
                product_id: Uuid::new_v4(),
                name: "Lamp".into(),
                quantity: 1,
                price: 900,
                image: None,
            }],
            customer_info: None,
            payment_method: None,
        },
    )
    .await?
    .data
    .expect("receipt");

    for &from in OrderStatus::ALL {
        for &to in OrderStatus::ALL {
            set_status(&state, &admin, receipt.order_id, from).await?;
            let update = set_status(&state, &admin, receipt.order_id, to)
                .await?
                .data
                .expect("status update");
            assert_eq!(update.previous_status, from);
            assert_eq!(update.order.status, to);
            assert_eq!(update.transition, from.transition_to(to));
        }
    }

    order_service::delete_order(&state, &admin, receipt.order_id).await?;
    Ok(())
}

async fn set_status(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<ApiResponse<StatusUpdate>, AppError> {
    order_service::update_status(
        state,
        admin,
        order_id,
        UpdateOrderStatusRequest {
            status: status.as_str().to_string(),
        },
    )
    .await
}
