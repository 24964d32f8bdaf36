use chrono::Utc;

use crate::{
    dto::cart::{AddToCartRequest, CartQuery, CreateCartRequest, MenuList, UpdateCartItemRequest},
    error::{AppError, AppResult},
    models::{AmountOverflow, CartLineItem, CartSnapshot, ItemRef},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn discount_percent(state: &AppState, item: ItemRef) -> u8 {
    state
        .catalog
        .get(item)
        .map(|menu| menu.discount_percent)
        .unwrap_or(0)
}

fn ensure_quantity(quantity: u32) -> AppResult<()> {
    if quantity == 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub fn list_menu(state: &AppState) -> ApiResponse<MenuList> {
    ApiResponse::success(
        "OK",
        MenuList {
            items: state.catalog.list(),
        },
        Some(Meta::empty()),
    )
}

pub fn get_cart(state: &AppState, query: CartQuery) -> AppResult<ApiResponse<CartSnapshot>> {
    let owner = query.owner().ok_or_else(|| {
        AppError::BadRequest("exactly one of user_id or session_id is required".to_string())
    })?;
    let cart = state
        .carts
        .active_cart(&owner, query.branch_id, Utc::now())
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::cart("OK", cart))
}

pub fn create_cart(
    state: &AppState,
    payload: CreateCartRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    if let crate::models::CartOwner::Session(session) = &payload.owner {
        if session.is_empty() {
            return Err(AppError::BadRequest("session id must not be empty".to_string()));
        }
    }
    let cart = state
        .carts
        .create_cart(&payload.owner, payload.branch_id, Utc::now());
    tracing::info!(cart_id = cart.id, branch_id = cart.branch_id, "cart_create");
    Ok(ApiResponse::cart("Cart created", cart))
}

pub fn add_to_cart(
    state: &AppState,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    ensure_quantity(payload.quantity)?;

    let menu_item = state
        .catalog
        .get(payload.item)
        .filter(|menu| menu.available)
        .cloned()
        .ok_or_else(|| AppError::BadRequest("menu item not found".to_string()))?;

    let now = Utc::now();
    let cart = state
        .carts
        .create_cart(&payload.owner, payload.branch_id, now);
    let line_id = state.carts.next_line_id();

    let instructions = payload
        .special_instructions
        .filter(|text| !text.trim().is_empty());
    let cart = state.carts.modify(cart.id, now, |cart| {
        let existing = cart
            .items
            .iter_mut()
            .find(|line| line.item == payload.item && line.special_instructions == instructions);
        match existing {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(payload.quantity)
                    .ok_or(AmountOverflow)?;
                line.reprice(menu_item.discount_percent)?;
            }
            None => {
                let mut line = CartLineItem {
                    id: line_id,
                    item: payload.item,
                    name: menu_item.name.clone(),
                    image: menu_item.image.clone(),
                    quantity: payload.quantity,
                    unit_price: menu_item.price,
                    discount_amount: 0,
                    final_price: 0,
                    special_instructions: instructions.clone(),
                };
                line.reprice(menu_item.discount_percent)?;
                cart.items.push(line);
            }
        }
        Ok(())
    })?;

    tracing::info!(
        cart_id = cart.id,
        item_id = payload.item.item_id,
        quantity = payload.quantity,
        "cart_add"
    );
    Ok(ApiResponse::cart("Added to cart", cart))
}

pub fn update_cart_item(
    state: &AppState,
    line_id: i64,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartSnapshot>> {
    ensure_quantity(payload.quantity)?;
    let cart_id = state.carts.cart_for_line(line_id).ok_or(AppError::NotFound)?;

    let cart = state.carts.modify(cart_id, Utc::now(), |cart| {
        let line = cart
            .items
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or(AppError::NotFound)?;
        line.quantity = payload.quantity;
        line.reprice(discount_percent(state, line.item))?;
        Ok(())
    })?;

    tracing::info!(cart_id, line_id, quantity = payload.quantity, "cart_update");
    Ok(ApiResponse::cart("Cart updated", cart))
}

pub fn remove_cart_item(state: &AppState, line_id: i64) -> AppResult<ApiResponse<CartSnapshot>> {
    let cart_id = state.carts.cart_for_line(line_id).ok_or(AppError::NotFound)?;

    let cart = state.carts.modify(cart_id, Utc::now(), |cart| {
        let before = cart.items.len();
        cart.items.retain(|line| line.id != line_id);
        if cart.items.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    })?;

    tracing::info!(cart_id, line_id, "cart_remove");
    Ok(ApiResponse::cart("Removed from cart", cart))
}

pub fn clear_cart(state: &AppState, cart_id: i64) -> AppResult<ApiResponse<CartSnapshot>> {
    let cart = state.carts.modify(cart_id, Utc::now(), |cart| {
        cart.items.clear();
        Ok(())
    })?;

    tracing::info!(cart_id, "cart_clear");
    Ok(ApiResponse::cart("Cart cleared", cart))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::Catalog, models::CartOwner};

    fn add(state: &AppState, item: ItemRef, quantity: u32) -> AppResult<CartSnapshot> {
        let response = add_to_cart(
            state,
            AddToCartRequest {
                owner: CartOwner::Session("guest".into()),
                branch_id: 1,
                item,
                quantity,
                special_instructions: None,
            },
        )?;
        Ok(response.data.expect("cart data"))
    }

    #[test]
    fn add_is_cumulative_and_priced() -> anyhow::Result<()> {
        let state = AppState::new(Catalog::demo());
        add(&state, ItemRef::dish(2), 1)?;
        let cart = add(&state, ItemRef::dish(2), 3)?;

        assert_eq!(cart.items.len(), 1);
        let line = &cart.items[0];
        assert_eq!(line.quantity, 4);
        assert_eq!(line.unit_price, 3500);
        // 10% off 14000
        assert_eq!(line.discount_amount, 1400);
        assert_eq!(line.final_price, 12600);
        assert_eq!(cart.total_items, 4);
        assert_eq!(cart.total_amount, 12600);
        Ok(())
    }

    #[test]
    fn oversized_quantities_are_rejected_without_changing_the_cart() -> anyhow::Result<()> {
        let state = AppState::new(Catalog::demo());
        add(&state, ItemRef::dish(1), u32::MAX)?;

        assert!(matches!(
            add(&state, ItemRef::dish(1), u32::MAX),
            Err(AppError::BadRequest(_))
        ));
        // a second line that pushes the item total past u32::MAX
        assert!(matches!(
            add(&state, ItemRef::dish(7), 1),
            Err(AppError::BadRequest(_))
        ));

        let cart = state
            .carts
            .active_cart(&CartOwner::Session("guest".into()), 1, Utc::now())
            .expect("cart");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, u32::MAX);
        assert_eq!(cart.total_items, u32::MAX);
        Ok(())
    }

    #[test]
    fn rejects_zero_quantity_and_unknown_items() {
        let state = AppState::new(Catalog::demo());
        assert!(matches!(
            add(&state, ItemRef::dish(1), 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            add(&state, ItemRef::dish(404), 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn update_remove_and_clear() -> anyhow::Result<()> {
        let state = AppState::new(Catalog::demo());
        add(&state, ItemRef::dish(1), 1)?;
        let cart = add(&state, ItemRef::combo(2), 1)?;
        let pho = cart.items[0].id;
        let combo = cart.items[1].id;

        let cart = update_cart_item(&state, pho, UpdateCartItemRequest { quantity: 3 })?
            .data
            .expect("cart");
        assert_eq!(cart.total_items, 4);
        assert!(matches!(
            update_cart_item(&state, pho, UpdateCartItemRequest { quantity: 0 }),
            Err(AppError::BadRequest(_))
        ));

        let cart = remove_cart_item(&state, combo)?.data.expect("cart");
        assert_eq!(cart.items.len(), 1);
        assert!(matches!(
            remove_cart_item(&state, combo),
            Err(AppError::NotFound)
        ));

        let cart = clear_cart(&state, cart.id)?.data.expect("cart");
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, 0);
        Ok(())
    }

    #[test]
    fn get_cart_reports_missing_cart_as_not_found() {
        let state = AppState::new(Catalog::demo());
        let query = CartQuery::new(&CartOwner::User(1), 3);
        assert!(matches!(get_cart(&state, query), Err(AppError::NotFound)));
    }
}
