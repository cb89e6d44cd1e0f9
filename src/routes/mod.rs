use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/carts", cart::router())
        .nest("/orders", orders::router())
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
