use std::sync::Arc;

use crate::repository::PriceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PriceStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }
}
