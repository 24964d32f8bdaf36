//! Seam between the cart context and the remote cart service.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::{
    dto::cart::AddToCartRequest,
    models::{CartOwner, CartSnapshot},
};

/// Errors that can occur when talking to the cart service.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// The service has no cart (or line) for the request.
    #[error("cart not found")]
    NotFound,

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned a non-2xx response or an unusable body.
    #[error("cart service responded with {status}: {message}")]
    UnexpectedResponse { status: u16, message: String },
}

/// Remote cart operations. Every mutating call answers with the full cart.
#[automock]
#[async_trait]
pub trait CartService: Send + Sync {
    /// Fetch the active cart for an owner and branch.
    async fn get_cart(
        &self,
        owner: CartOwner,
        branch_id: i64,
    ) -> Result<CartSnapshot, CartServiceError>;

    /// Create an empty cart for an owner and branch.
    async fn create_cart(
        &self,
        owner: CartOwner,
        branch_id: i64,
    ) -> Result<CartSnapshot, CartServiceError>;

    async fn add_item(&self, request: AddToCartRequest) -> Result<CartSnapshot, CartServiceError>;

    async fn update_item(
        &self,
        line_id: i64,
        quantity: u32,
    ) -> Result<CartSnapshot, CartServiceError>;

    async fn remove_item(&self, line_id: i64) -> Result<CartSnapshot, CartServiceError>;

    /// Empty the cart, keeping the cart itself.
    async fn clear_cart(&self, cart_id: i64) -> Result<CartSnapshot, CartServiceError>;
}
