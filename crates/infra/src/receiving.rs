//! Receiving engine: the one cross-aggregate service.
//!
//! A receiving batch touches three things: the manufacturer order (line
//! counters, delivery logs, status), the stock ledger (on-hand increments),
//! and the invoicing stream (one payable invoice per non-empty batch). The
//! order mutation commits first as a single event append under optimistic
//! concurrency; stock updates are best-effort per item and the invoice is
//! issued only after the batch commit succeeds.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use vendora_core::{AggregateId, Clock};
use vendora_events::{EventBus, EventEnvelope};
use vendora_inventory::StockLedger;
use vendora_invoicing::{
    InvoiceId, InvoiceLineSpec, IssueInvoice, MarkPaid, VendorInvoice, VendorInvoiceCommand,
};
use vendora_orders::{
    ManufacturerOrder, NewOrderLine, OrderCommand, OrderEvent, OrderId, OrderStatus, PlaceOrder,
    ReceiptDeclaration, ReceiptEntry, ReceiptOutcome, ReceiveItems, SetStatus,
};
use vendora_vendors::{VendorDirectory, VendorId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

const ORDER_AGGREGATE: &str = "orders.manufacturer_order";
const INVOICE_AGGREGATE: &str = "invoicing.vendor_invoice";

const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Bounded retries when a batch loses an optimistic-concurrency race;
/// re-dispatching reloads the stream, so the batch applies on top of the
/// competing write instead of clobbering it.
const MAX_DISPATCH_ATTEMPTS: u32 = 3;

/// Result of one receiving batch.
#[derive(Debug)]
pub struct ReceiveOutcome {
    /// The order after the batch was applied.
    pub order: ManufacturerOrder,
    /// Per-declaration results, in declaration order.
    pub outcomes: Vec<ReceiptOutcome>,
    /// The payable generated for this batch, if any line applied with a
    /// positive subtotal.
    pub invoice: Option<VendorInvoice>,
}

/// Application service over the order/invoice aggregates plus the stock and
/// vendor collaborators.
pub struct ReceivingEngine<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    stock: Arc<dyn StockLedger>,
    vendors: Arc<dyn VendorDirectory>,
    clock: Arc<dyn Clock>,
}

impl<S, B> ReceivingEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        store: S,
        bus: B,
        stock: Arc<dyn StockLedger>,
        vendors: Arc<dyn VendorDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            stock,
            vendors,
            clock,
        }
    }

    /// Place a new manufacturer order.
    pub fn create_order(
        &self,
        vendor_id: VendorId,
        order_date: chrono::DateTime<chrono::Utc>,
        expected_arrival: chrono::DateTime<chrono::Utc>,
        lines: Vec<NewOrderLine>,
    ) -> Result<ManufacturerOrder, DispatchError> {
        let order_id = OrderId::new(AggregateId::new());
        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            vendor_id,
            order_date,
            expected_arrival,
            lines,
            occurred_at: self.clock.now(),
        });

        self.dispatcher.dispatch::<ManufacturerOrder>(
            order_id.0,
            ORDER_AGGREGATE,
            cmd,
            |id| ManufacturerOrder::empty(OrderId::new(id)),
        )?;

        self.load_order(order_id)
    }

    /// Process one receiving batch against an order.
    ///
    /// `discount` is a flat amount in smallest currency unit; `cgst_bp` and
    /// `sgst_bp` are tax rates in basis points, both applied to the
    /// pre-discount batch subtotal.
    pub fn receive_items(
        &self,
        order_id: OrderId,
        receipts: Vec<ReceiptDeclaration>,
        discount: u64,
        cgst_bp: u32,
        sgst_bp: u32,
        received_by: Option<String>,
    ) -> Result<ReceiveOutcome, DispatchError> {
        let mut attempts = 0;
        let committed = loop {
            attempts += 1;
            let cmd = OrderCommand::ReceiveItems(ReceiveItems {
                order_id,
                receipts: receipts.clone(),
                received_by: received_by.clone(),
                occurred_at: self.clock.now(),
            });

            match self.dispatcher.dispatch::<ManufacturerOrder>(
                order_id.0,
                ORDER_AGGREGATE,
                cmd,
                |id| ManufacturerOrder::empty(OrderId::new(id)),
            ) {
                Ok(committed) => break committed,
                Err(DispatchError::Concurrency(msg)) if attempts < MAX_DISPATCH_ATTEMPTS => {
                    tracing::debug!(
                        order_id = %order_id,
                        attempt = attempts,
                        "receiving batch lost a concurrent update race, retrying: {msg}"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let order = self.load_order(order_id)?;
        let outcomes = order.classify_receipts(&receipts);
        for outcome in &outcomes {
            match outcome {
                ReceiptOutcome::Applied { .. } => {}
                ReceiptOutcome::SkippedUnmatched { product_id } => {
                    tracing::warn!(
                        order_id = %order_id,
                        product_id = %product_id,
                        "receipt declaration skipped: product not on order"
                    );
                }
                ReceiptOutcome::SkippedZeroQuantity { product_id } => {
                    tracing::warn!(
                        order_id = %order_id,
                        product_id = %product_id,
                        "receipt declaration skipped: zero quantity"
                    );
                }
            }
        }

        // What this batch actually recorded, straight from the committed facts.
        let mut entries: Vec<ReceiptEntry> = Vec::new();
        for stored in &committed {
            let ev: OrderEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            if let OrderEvent::BatchReceived(batch) = ev {
                entries.extend(batch.entries);
            }
        }

        for line in order.lines() {
            if line.quantity_received > line.quantity_ordered
                && entries.iter().any(|e| e.product_id == line.product_id)
            {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %line.product_id,
                    ordered = line.quantity_ordered,
                    received = line.quantity_received,
                    "line received beyond ordered quantity"
                );
            }
        }

        // Best-effort per item: receipt bookkeeping is never blocked by an
        // inventory lookup failure.
        for entry in &entries {
            if let Err(e) = self.stock.increase_stock(&entry.product_id, entry.quantity) {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %entry.product_id,
                    "stock update skipped: {e}"
                );
            }
        }

        let sub_total = entries
            .iter()
            .map(ReceiptEntry::line_total)
            .fold(0u64, u64::saturating_add);

        let invoice = if sub_total > 0 {
            Some(self.issue_invoice(&order, &receipts, &entries, discount, cgst_bp, sgst_bp)?)
        } else {
            None
        };

        Ok(ReceiveOutcome {
            order,
            outcomes,
            invoice,
        })
    }

    fn issue_invoice(
        &self,
        order: &ManufacturerOrder,
        receipts: &[ReceiptDeclaration],
        entries: &[ReceiptEntry],
        discount: u64,
        cgst_bp: u32,
        sgst_bp: u32,
    ) -> Result<VendorInvoice, DispatchError> {
        let invoice_id = InvoiceId::new(AggregateId::new());

        // The invoice is dated to the receiving event, not to processing time.
        let invoice_date = receipts
            .first()
            .and_then(|d| d.received_at)
            .unwrap_or_else(|| self.clock.now());

        let vendor_name = order
            .vendor_id()
            .and_then(|v| self.vendors.vendor_name(&v))
            .unwrap_or_else(|| UNKNOWN_VENDOR.to_string());

        let lines = entries
            .iter()
            .map(|entry| InvoiceLineSpec {
                product_id: entry.product_id.clone(),
                product_name: order
                    .lines()
                    .iter()
                    .find(|l| l.product_id == entry.product_id)
                    .map(|l| l.product_name.clone())
                    .unwrap_or_default(),
                quantity: entry.quantity,
                unit_cost: entry.unit_cost,
            })
            .collect();

        let cmd = VendorInvoiceCommand::IssueInvoice(IssueInvoice {
            invoice_id,
            order_id: order.id_typed(),
            vendor_name,
            lines,
            discount,
            cgst_bp,
            sgst_bp,
            invoice_date,
            occurred_at: self.clock.now(),
        });

        self.dispatcher.dispatch::<VendorInvoice>(
            invoice_id.0,
            INVOICE_AGGREGATE,
            cmd,
            |id| VendorInvoice::empty(InvoiceId::new(id)),
        )?;

        self.load_invoice(invoice_id)
    }

    /// Administrative status override (incl. cancellation).
    pub fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<ManufacturerOrder, DispatchError> {
        let cmd = OrderCommand::SetStatus(SetStatus {
            order_id,
            status,
            occurred_at: self.clock.now(),
        });

        self.dispatcher.dispatch::<ManufacturerOrder>(
            order_id.0,
            ORDER_AGGREGATE,
            cmd,
            |id| ManufacturerOrder::empty(OrderId::new(id)),
        )?;

        self.load_order(order_id)
    }

    /// Transition an invoice Pending -> Paid (idempotent on re-pay).
    pub fn pay_invoice(&self, invoice_id: InvoiceId) -> Result<VendorInvoice, DispatchError> {
        let cmd = VendorInvoiceCommand::MarkPaid(MarkPaid {
            invoice_id,
            occurred_at: self.clock.now(),
        });

        self.dispatcher.dispatch::<VendorInvoice>(
            invoice_id.0,
            INVOICE_AGGREGATE,
            cmd,
            |id| VendorInvoice::empty(InvoiceId::new(id)),
        )?;

        self.load_invoice(invoice_id)
    }

    /// Rehydrate an order from the event store (source of truth).
    pub fn load_order(&self, order_id: OrderId) -> Result<ManufacturerOrder, DispatchError> {
        let order = self
            .dispatcher
            .rehydrate(order_id.0, |id| ManufacturerOrder::empty(OrderId::new(id)))?;
        if !order.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(order)
    }

    /// Rehydrate an invoice from the event store (source of truth).
    pub fn load_invoice(&self, invoice_id: InvoiceId) -> Result<VendorInvoice, DispatchError> {
        let invoice = self
            .dispatcher
            .rehydrate(invoice_id.0, |id| VendorInvoice::empty(InvoiceId::new(id)))?;
        if !invoice.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(invoice)
    }
}
