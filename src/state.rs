use std::sync::Arc;

use crate::{catalog::Catalog, store::CartStore};

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<CartStore>,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            carts: Arc::new(CartStore::new()),
            catalog: Arc::new(catalog),
        }
    }
}
