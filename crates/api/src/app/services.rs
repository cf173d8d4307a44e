use std::sync::Arc;

use serde_json::Value as JsonValue;

use vendora_core::{Clock, SystemClock};
use vendora_events::{EventBus, EventEnvelope, InMemoryEventBus};
use vendora_infra::{
    InMemoryEventStore, InMemoryStore, ReceivingEngine,
    projections::{
        invoices::{InvoiceFilter, InvoiceReadModel, InvoicesProjection},
        orders::{OrderReadModel, OrdersProjection},
    },
};
use vendora_inventory::{InMemoryStockLedger, StockLedger};
use vendora_invoicing::InvoiceId;
use vendora_orders::OrderId;
use vendora_vendors::{InMemoryVendorDirectory, VendorDirectory, VendorId};

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Engine = ReceivingEngine<Arc<InMemoryEventStore>, Arc<Bus>>;
type OrdersRm = OrdersProjection<Arc<InMemoryStore<OrderId, OrderReadModel>>>;
type InvoicesRm = InvoicesProjection<Arc<InMemoryStore<InvoiceId, InvoiceReadModel>>>;

const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Wired application services shared by all handlers.
pub struct AppServices {
    engine: Engine,
    orders_projection: Arc<OrdersRm>,
    invoices_projection: Arc<InvoicesRm>,
    vendors: Arc<InMemoryVendorDirectory>,
}

/// In-memory infra wiring (dev/test): store + bus + projections + engine.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
    let stock = Arc::new(InMemoryStockLedger::new());
    let vendors = Arc::new(InMemoryVendorDirectory::new());

    let orders_projection: Arc<OrdersRm> =
        Arc::new(OrdersProjection::new(Arc::new(InMemoryStore::new())));
    let invoices_projection: Arc<InvoicesRm> =
        Arc::new(InvoicesProjection::new(Arc::new(InMemoryStore::new())));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let orders_projection = orders_projection.clone();
        let invoices_projection = invoices_projection.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        if let Err(e) = orders_projection.apply_envelope(&env) {
                            tracing::warn!("orders projection apply failed: {e}");
                        }
                        if let Err(e) = invoices_projection.apply_envelope(&env) {
                            tracing::warn!("invoices projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let engine = ReceivingEngine::new(
        store,
        bus,
        stock as Arc<dyn StockLedger>,
        vendors.clone() as Arc<dyn VendorDirectory>,
        Arc::new(SystemClock) as Arc<dyn Clock>,
    );

    AppServices {
        engine,
        orders_projection,
        invoices_projection,
        vendors,
    }
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Vendor label for display, with the directory miss fallback.
    pub fn vendor_label(&self, vendor_id: &VendorId) -> String {
        self.vendors
            .vendor_name(vendor_id)
            .unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
    }

    pub fn orders_get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.orders_projection.get(order_id)
    }

    /// Orders, newest first.
    pub fn orders_list(&self) -> Vec<OrderReadModel> {
        self.orders_projection.list()
    }

    pub fn invoices_get(&self, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices_projection.get(invoice_id)
    }

    /// Invoices matching `filter`, newest first.
    pub fn invoices_list(&self, filter: &InvoiceFilter) -> Vec<InvoiceReadModel> {
        self.invoices_projection.list(filter)
    }
}
