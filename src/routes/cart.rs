use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};

use crate::{
    dto::cart::{AddToCartRequest, CartQuery, CreateCartRequest, UpdateCartItemRequest},
    error::AppResult,
    models::CartSnapshot,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(create_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{line_id}", put(update_cart_item).delete(remove_cart_item))
        .route("/{cart_id}", delete(clear_cart))
}

#[utoipa::path(
    get,
    path = "/api/carts",
    params(CartQuery),
    responses(
        (status = 200, description = "Active cart for the owner and branch", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Owner missing or ambiguous"),
        (status = 404, description = "No cart yet"),
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::get_cart(&state, query).map(Json)
}

#[utoipa::path(
    post,
    path = "/api/carts",
    request_body = CreateCartRequest,
    responses(
        (status = 200, description = "Created cart, or the existing active one", body = ApiResponse<CartSnapshot>),
    ),
    tag = "Cart"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    Json(payload): Json<CreateCartRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::create_cart(&state, payload).map(Json)
}

#[utoipa::path(
    post,
    path = "/api/carts/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added; quantity accumulates on an identical line", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Bad request"),
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::add_to_cart(&state, payload).map(Json)
}

#[utoipa::path(
    put,
    path = "/api/carts/items/{line_id}",
    params(
        ("line_id" = i64, Path, description = "Cart line ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "OK", body = ApiResponse<CartSnapshot>),
        (status = 400, description = "Quantity must be at least 1"),
        (status = 404, description = "Cart line not found"),
    ),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::update_cart_item(&state, line_id, payload).map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/carts/items/{line_id}",
    params(
        ("line_id" = i64, Path, description = "Cart line ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<CartSnapshot>),
        (status = 404, description = "Cart line not found"),
    ),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::remove_cart_item(&state, line_id).map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/carts/{cart_id}",
    params(
        ("cart_id" = i64, Path, description = "Cart ID")
    ),
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<CartSnapshot>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(cart_id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    cart_service::clear_cart(&state, cart_id).map(Json)
}
