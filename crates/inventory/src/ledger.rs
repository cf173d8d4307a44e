use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::product::ProductId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The product is not tracked by the ledger.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Internal storage failure (e.g. lock poisoning).
    #[error("stock storage unavailable")]
    Unavailable,
}

/// Per-product on-hand stock.
///
/// Increments must be applied as atomic read-modify-writes so that concurrent
/// receipts against the same product from different orders never lose updates.
pub trait StockLedger: Send + Sync {
    /// Increase on-hand stock for `product_id` by `amount`.
    fn increase_stock(&self, product_id: &ProductId, amount: u32) -> Result<(), StockError>;

    /// Current on-hand quantity, if the product is tracked.
    fn on_hand(&self, product_id: &ProductId) -> Option<u64>;
}

impl<L> StockLedger for Arc<L>
where
    L: StockLedger + ?Sized,
{
    fn increase_stock(&self, product_id: &ProductId, amount: u32) -> Result<(), StockError> {
        (**self).increase_stock(product_id, amount)
    }

    fn on_hand(&self, product_id: &ProductId) -> Option<u64> {
        (**self).on_hand(product_id)
    }
}

/// In-memory stock ledger for tests/dev.
///
/// Increments happen under the write lock, so each is an atomic
/// read-modify-write over the stored quantity.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    stock: RwLock<HashMap<ProductId, u64>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a product at the given quantity.
    pub fn track(&self, product_id: ProductId, quantity: u64) {
        if let Ok(mut stock) = self.stock.write() {
            stock.insert(product_id, quantity);
        }
    }
}

impl StockLedger for InMemoryStockLedger {
    fn increase_stock(&self, product_id: &ProductId, amount: u32) -> Result<(), StockError> {
        let mut stock = self.stock.write().map_err(|_| StockError::Unavailable)?;

        match stock.get_mut(product_id) {
            Some(on_hand) => {
                *on_hand = on_hand.saturating_add(u64::from(amount));
                Ok(())
            }
            None => Err(StockError::UnknownProduct(product_id.clone())),
        }
    }

    fn on_hand(&self, product_id: &ProductId) -> Option<u64> {
        let stock = self.stock.read().ok()?;
        stock.get(product_id).copied()
    }
}
