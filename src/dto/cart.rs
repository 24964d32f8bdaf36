use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{CartOwner, ItemRef, MenuItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateCartRequest {
    pub owner: CartOwner,
    pub branch_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub owner: CartOwner,
    pub branch_id: i64,
    pub item: ItemRef,
    pub quantity: u32,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

/// Owner and branch lookup; exactly one of `user_id` / `session_id` is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CartQuery {
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
    pub branch_id: i64,
}

impl CartQuery {
    pub fn new(owner: &CartOwner, branch_id: i64) -> Self {
        let (user_id, session_id) = match owner {
            CartOwner::User(id) => (Some(*id), None),
            CartOwner::Session(id) => (None, Some(id.clone())),
        };
        Self {
            user_id,
            session_id,
            branch_id,
        }
    }

    pub fn owner(&self) -> Option<CartOwner> {
        match (self.user_id, self.session_id.as_deref()) {
            (Some(id), None) => Some(CartOwner::User(id)),
            (None, Some(session)) if !session.is_empty() => {
                Some(CartOwner::Session(session.to_string()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MenuList {
    pub items: Vec<MenuItem>,
}
