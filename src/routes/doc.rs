use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AdminAuthResponse, AuthResponse, LoginRequest, RegisterRequest},
        cart::{CartItemInput, UpdateCartItemRequest, UpsertCartRequest},
        orders::{
            CreateOrderRequest, OrderItemInput, OrderList, OrderReceipt, StatusUpdate,
            UpdateOrderStatusRequest, UpdatePaymentStatusRequest,
        },
        products::{ProductList, ProductUpload},
    },
    models::{
        Admin, Cart, CartItem, CustomerInfo, Order, OrderLine, OrderStatus, PaymentMethod,
        PaymentStatus, Product, ProductImage, ProductSummary, Provider, Role, StatusTransition,
        User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, products as product_routes,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::me,
        auth::google_start,
        auth::google_callback,
        admin::register_admin,
        admin::login_admin,
        admin::current_admin,
        cart::upsert_cart,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::create_order,
        orders::list_orders,
        orders::list_by_status,
        orders::get_order,
        orders::update_status,
        orders::update_payment,
        orders::delete_order,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product
    ),
    components(
        schemas(
            User,
            Admin,
            Role,
            Provider,
            Product,
            ProductImage,
            ProductSummary,
            Cart,
            CartItem,
            CustomerInfo,
            Order,
            OrderLine,
            OrderStatus,
            PaymentMethod,
            PaymentStatus,
            StatusTransition,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            AdminAuthResponse,
            UpsertCartRequest,
            CartItemInput,
            UpdateCartItemRequest,
            CreateOrderRequest,
            OrderItemInput,
            OrderReceipt,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            StatusUpdate,
            OrderList,
            ProductList,
            ProductUpload,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderReceipt>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<AuthResponse>,
            ApiResponse<AdminAuthResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Shopper registration, login and Google sign-in"),
        (name = "Admin", description = "Administrator accounts"),
        (name = "Cart", description = "Per-owner shopping carts"),
        (name = "Orders", description = "Order placement and fulfilment"),
        (name = "Products", description = "Catalog with hosted images"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/carts",
            "/api/carts/{owner_id}/items/{product_id}",
            "/api/orders/{id}/status",
            "/api/orders/{id}/payment",
            "/api/products/{id}",
            "/api/auth/google/callback",
            "/api/admin/register",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
