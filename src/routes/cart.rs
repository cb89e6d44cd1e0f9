use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{CartItemInput, UpdateCartItemRequest, UpsertCartRequest},
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::AuthUser,
    models::Cart,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upsert_cart))
        .route("/{owner_id}", get(get_cart).delete(clear_cart))
        .route("/{owner_id}/items", post(add_item))
        .route(
            "/{owner_id}/items/{product_id}",
            put(update_item).delete(remove_item),
        )
}

#[utoipa::path(
    post,
    path = "/api/carts",
    request_body = UpsertCartRequest,
    responses(
        (status = 200, description = "Replace the owner's cart items", body = ApiResponse<Cart>),
        (status = 400, description = "Invalid items"),
        (status = 403, description = "Not the cart owner"),
        (status = 404, description = "Owner not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn upsert_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpsertCartRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::upsert_cart(&state, &user, payload.owner_id, payload.items).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/carts/{owner_id}",
    params(("owner_id" = Uuid, Path, description = "Cart owner")),
    responses(
        (status = 200, description = "The owner's cart", body = ApiResponse<Cart>),
        (status = 404, description = "No cart yet; data holds the empty cart", body = ApiResponse<Cart>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(owner_id): AppPath<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<Cart>>)> {
    match cart_service::get_cart(&state, &user, owner_id).await? {
        Some(cart) => Ok((StatusCode::OK, Json(ApiResponse::success("Cart", cart, None)))),
        None => {
            let body = ApiResponse {
                success: false,
                message: "Cart not found".to_string(),
                data: Some(Cart::empty(owner_id)),
                meta: None,
            };
            Ok((StatusCode::NOT_FOUND, Json(body)))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/carts/{owner_id}/items",
    params(("owner_id" = Uuid, Path, description = "Cart owner")),
    request_body = CartItemInput,
    responses(
        (status = 200, description = "Add a product or increase its quantity", body = ApiResponse<Cart>),
        (status = 400, description = "Invalid quantity or price"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(owner_id): AppPath<Uuid>,
    AppJson(payload): AppJson<CartItemInput>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::add_item(&state, &user, owner_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/carts/{owner_id}/items/{product_id}",
    params(
        ("owner_id" = Uuid, Path, description = "Cart owner"),
        ("product_id" = Uuid, Path, description = "Product in the cart")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Set the line quantity", body = ApiResponse<Cart>),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "Cart or line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath((owner_id, product_id)): AppPath<(Uuid, Uuid)>,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp =
        cart_service::update_item_quantity(&state, &user, owner_id, product_id, payload.quantity)
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{owner_id}/items/{product_id}",
    params(
        ("owner_id" = Uuid, Path, description = "Cart owner"),
        ("product_id" = Uuid, Path, description = "Product in the cart")
    ),
    responses(
        (status = 200, description = "Line removed; the cart is deleted when it was the last one", body = ApiResponse<Cart>),
        (status = 404, description = "Cart or line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath((owner_id, product_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::remove_item(&state, &user, owner_id, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/carts/{owner_id}",
    params(("owner_id" = Uuid, Path, description = "Cart owner")),
    responses(
        (status = 200, description = "Cart deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(owner_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let resp = cart_service::clear_cart(&state, &user, owner_id).await?;
    Ok(Json(resp))
}
