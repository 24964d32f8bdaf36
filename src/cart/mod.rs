//! Client-side cart synchronization against the remote cart service.

pub mod context;
pub mod http;
pub mod identity;
pub mod service;

pub use context::{CartContext, CartError};
pub use http::HttpCartService;
pub use identity::{AuthUser, SESSION_ID_KEY, SessionIdentity};
pub use service::{CartService, CartServiceError};
