use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CartSnapshot;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Meta {
    pub total_items: Option<u32>,
    pub total_amount: Option<i64>,
}

impl Meta {
    pub fn for_cart(cart: &CartSnapshot) -> Self {
        Self {
            total_items: Some(cart.total_items),
            total_amount: Some(cart.total_amount),
        }
    }

    pub fn empty() -> Self {
        Self {
            total_items: None,
            total_amount: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

impl ApiResponse<CartSnapshot> {
    pub fn cart(message: impl Into<String>, cart: CartSnapshot) -> Self {
        let meta = Meta::for_cart(&cart);
        Self::success(message, cart, Some(meta))
    }
}
