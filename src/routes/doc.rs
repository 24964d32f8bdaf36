use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::cart::{AddToCartRequest, CartQuery, CreateCartRequest, MenuList, UpdateCartItemRequest},
    models::{CartLineItem, CartOwner, CartSnapshot, ItemRef, ItemType, MenuItem},
    response::{ApiResponse, Meta},
    routes::{cart, health, menu},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        menu::list_menu,
        cart::get_cart,
        cart::create_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart
    ),
    components(
        schemas(
            ItemType,
            ItemRef,
            CartOwner,
            CartLineItem,
            CartSnapshot,
            MenuItem,
            MenuList,
            CreateCartRequest,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartQuery,
            health::HealthData,
            Meta,
            ApiResponse<CartSnapshot>,
            ApiResponse<MenuList>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Menu", description = "Menu endpoints"),
        (name = "Cart", description = "Cart endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
