use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::cart::MenuList, response::ApiResponse, services::cart_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_menu))
}

#[utoipa::path(
    get,
    path = "/api/menu",
    responses(
        (status = 200, description = "Dishes and combos that can be added to a cart", body = ApiResponse<MenuList>)
    ),
    tag = "Menu"
)]
pub async fn list_menu(State(state): State<AppState>) -> Json<ApiResponse<MenuList>> {
    Json(cart_service::list_menu(&state))
}
