//! Disposable, rebuildable read models fed from the event bus.

pub mod invoices;
pub mod orders;

pub use invoices::{InvoiceFilter, InvoiceReadModel, InvoicesProjection};
pub use orders::{OrderReadModel, OrdersProjection};
