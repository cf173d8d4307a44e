//! `vendora-orders` — manufacturer purchase orders and batch receiving.
//!
//! A [`ManufacturerOrder`] tracks what was ordered from a vendor, how much of
//! it has physically arrived across any number of receiving batches, and the
//! derived order status. Receiving is append-only: every receipt lands in the
//! per-line delivery log and in the order-level receiving history.

pub mod order;

pub use order::{
    BatchReceived, Delivery, ManufacturerOrder, NewOrderLine, OrderCommand, OrderEvent, OrderId,
    OrderLine, OrderPlaced, OrderStatus, PlaceOrder, ReceiptDeclaration, ReceiptEntry,
    ReceiptOutcome, ReceiveItems, SetStatus, StatusOverridden,
};
