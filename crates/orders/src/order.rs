use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendora_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use vendora_events::Event;
use vendora_inventory::ProductId;
use vendora_vendors::VendorId;

/// Manufacturer order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// `PartiallyReceived` and `Received` are derived from line state after every
/// receiving batch; `InTransit` and `Cancelled` are only reachable through an
/// explicit status override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Ordered,
    InTransit,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// One product entry supplied at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Cost per unit in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
}

/// One recorded physical receipt event for a single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub quantity: u32,
    pub received_at: DateTime<Utc>,
    pub received_by: Option<String>,
}

/// Order line: ordered vs. received quantity plus the per-line delivery log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity_ordered: u32,
    /// Cached running total; always equals the sum of `deliveries` quantities.
    pub quantity_received: u32,
    /// Cost per unit in smallest currency unit, fixed at order creation.
    pub unit_cost: u64,
    pub deliveries: Vec<Delivery>,
}

impl OrderLine {
    pub fn remaining(&self) -> u32 {
        self.quantity_ordered.saturating_sub(self.quantity_received)
    }
}

/// One entry of the order-level receiving history (full audit trail across
/// all lines, independent of the per-line delivery logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub product_id: ProductId,
    pub quantity: u32,
    pub received_at: DateTime<Utc>,
    /// Line cost captured at receipt time.
    pub unit_cost: u64,
    pub received_by: Option<String>,
}

impl ReceiptEntry {
    /// Invoice line total for this receipt.
    pub fn line_total(&self) -> u64 {
        u64::from(self.quantity).saturating_mul(self.unit_cost)
    }
}

/// One caller-submitted receipt declaration inside a receiving batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDeclaration {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Defaults to the batch occurrence time when omitted.
    pub received_at: Option<DateTime<Utc>>,
}

/// Per-declaration processing result.
///
/// Skips are part of the lenient batch contract, not errors; they are
/// reported back so callers can observe what was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReceiptOutcome {
    Applied { product_id: ProductId, quantity: u32 },
    SkippedUnmatched { product_id: ProductId },
    SkippedZeroQuantity { product_id: ProductId },
}

/// Aggregate root: ManufacturerOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerOrder {
    id: OrderId,
    vendor_id: Option<VendorId>,
    order_date: DateTime<Utc>,
    expected_arrival: DateTime<Utc>,
    lines: Vec<OrderLine>,
    receiving_history: Vec<ReceiptEntry>,
    status: OrderStatus,
    /// Ordered value (quantity x cost summed over lines), fixed at creation.
    total_cost: u64,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl ManufacturerOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            vendor_id: None,
            order_date: DateTime::<Utc>::MIN_UTC,
            expected_arrival: DateTime::<Utc>::MIN_UTC,
            lines: Vec::new(),
            receiving_history: Vec::new(),
            status: OrderStatus::Ordered,
            total_cost: 0,
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn expected_arrival(&self) -> DateTime<Utc> {
        self.expected_arrival
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn receiving_history(&self) -> &[ReceiptEntry] {
        &self.receiving_history
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    /// Classify a batch of declarations against this order's line set.
    ///
    /// Pure read: classification depends only on line membership (fixed at
    /// creation) and the declared quantity, so the result is identical before
    /// and after the batch is applied.
    pub fn classify_receipts(&self, declarations: &[ReceiptDeclaration]) -> Vec<ReceiptOutcome> {
        declarations
            .iter()
            .map(|d| {
                let line = self.lines.iter().find(|l| l.product_id == d.product_id);
                match line {
                    None => ReceiptOutcome::SkippedUnmatched {
                        product_id: d.product_id.clone(),
                    },
                    Some(_) if d.quantity == 0 => ReceiptOutcome::SkippedZeroQuantity {
                        product_id: d.product_id.clone(),
                    },
                    Some(_) => ReceiptOutcome::Applied {
                        product_id: d.product_id.clone(),
                        quantity: d.quantity,
                    },
                }
            })
            .collect()
    }

    /// Status derivation rule, evaluated fresh from line state.
    ///
    /// Self-correcting regardless of the prior status; `Cancelled` is terminal.
    pub fn derive_status(current: OrderStatus, lines: &[OrderLine]) -> OrderStatus {
        if current == OrderStatus::Cancelled {
            return OrderStatus::Cancelled;
        }

        let all_received = lines
            .iter()
            .all(|l| l.quantity_received >= l.quantity_ordered);
        let some_received = lines.iter().any(|l| l.quantity_received > 0);

        if all_received {
            OrderStatus::Received
        } else if some_received {
            OrderStatus::PartiallyReceived
        } else {
            current
        }
    }
}

impl AggregateRoot for ManufacturerOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub order_date: DateTime<Utc>,
    pub expected_arrival: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveItems (one receiving batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItems {
    pub order_id: OrderId,
    pub receipts: Vec<ReceiptDeclaration>,
    pub received_by: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStatus (administrative override, incl. cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ReceiveItems(ReceiveItems),
    SetStatus(SetStatus),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub order_date: DateTime<Utc>,
    pub expected_arrival: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
    pub total_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchReceived.
///
/// Carries only the declarations that actually matched an order line with a
/// positive quantity; skipped declarations never become facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceived {
    pub order_id: OrderId,
    pub entries: Vec<ReceiptEntry>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusOverridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverridden {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    BatchReceived(BatchReceived),
    StatusOverridden(StatusOverridden),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.manufacturer_order.placed",
            OrderEvent::BatchReceived(_) => "orders.manufacturer_order.batch_received",
            OrderEvent::StatusOverridden(_) => "orders.manufacturer_order.status_overridden",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::BatchReceived(e) => e.occurred_at,
            OrderEvent::StatusOverridden(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ManufacturerOrder {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.vendor_id = Some(e.vendor_id);
                self.order_date = e.order_date;
                self.expected_arrival = e.expected_arrival;
                self.lines = e
                    .lines
                    .iter()
                    .map(|l| OrderLine {
                        product_id: l.product_id.clone(),
                        product_name: l.product_name.clone(),
                        quantity_ordered: l.quantity,
                        quantity_received: 0,
                        unit_cost: l.unit_cost,
                        deliveries: Vec::new(),
                    })
                    .collect();
                self.receiving_history.clear();
                self.status = OrderStatus::Ordered;
                self.total_cost = e.total_cost;
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::BatchReceived(e) => {
                for entry in &e.entries {
                    // Entries were matched against the line set when the event
                    // was decided; an entry without a line means a corrupt
                    // stream and is skipped rather than applied blindly.
                    let Some(line) = self
                        .lines
                        .iter_mut()
                        .find(|l| l.product_id == entry.product_id)
                    else {
                        continue;
                    };

                    line.quantity_received =
                        line.quantity_received.saturating_add(entry.quantity);
                    line.deliveries.push(Delivery {
                        quantity: entry.quantity,
                        received_at: entry.received_at,
                        received_by: entry.received_by.clone(),
                    });
                    self.receiving_history.push(entry.clone());
                }

                self.status = Self::derive_status(self.status, &self.lines);
            }
            OrderEvent::StatusOverridden(e) => {
                self.status = e.status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ReceiveItems(cmd) => self.handle_receive(cmd),
            OrderCommand::SetStatus(cmd) => self.handle_set_status(cmd),
        }
    }
}

impl ManufacturerOrder {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot place an order without lines"));
        }

        let mut total: u64 = 0;
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
            if line.product_name.trim().is_empty() {
                return Err(DomainError::validation("product name cannot be empty"));
            }
            if cmd.lines[..idx]
                .iter()
                .any(|earlier| earlier.product_id == line.product_id)
            {
                return Err(DomainError::validation(format!(
                    "duplicate product in order lines: {}",
                    line.product_id
                )));
            }

            let line_total = u64::from(line.quantity)
                .checked_mul(line.unit_cost)
                .ok_or_else(|| DomainError::invariant("order line amount overflow"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| DomainError::invariant("order total overflow"))?;
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            vendor_id: cmd.vendor_id,
            order_date: cmd.order_date,
            expected_arrival: cmd.expected_arrival,
            lines: cmd.lines.clone(),
            total_cost: total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveItems) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant(
                "cannot receive items for a cancelled order",
            ));
        }

        let mut entries = Vec::new();
        for declaration in &cmd.receipts {
            let Some(line) = self
                .lines
                .iter()
                .find(|l| l.product_id == declaration.product_id)
            else {
                // Stale client state; tolerated, not an error.
                continue;
            };
            if declaration.quantity == 0 {
                continue;
            }

            entries.push(ReceiptEntry {
                product_id: declaration.product_id.clone(),
                quantity: declaration.quantity,
                received_at: declaration.received_at.unwrap_or(cmd.occurred_at),
                unit_cost: line.unit_cost,
                received_by: cmd.received_by.clone(),
            });
        }

        if entries.is_empty() {
            // Nothing matched: no fact to record, status stays as-is.
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::BatchReceived(BatchReceived {
            order_id: cmd.order_id,
            entries,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_status(&self, cmd: &SetStatus) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        // No transition guard beyond existence: the caller owns avoiding
        // nonsensical overrides (e.g. un-cancelling).
        Ok(vec![OrderEvent::StatusOverridden(StatusOverridden {
            order_id: cmd.order_id,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_vendor_id() -> VendorId {
        VendorId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn day(offset: i64) -> DateTime<Utc> {
        test_time() + chrono::Duration::days(offset)
    }

    fn widget_line(quantity: u32, unit_cost: u64) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new("SKU-WIDGET"),
            product_name: "Widget".to_string(),
            quantity,
            unit_cost,
        }
    }

    fn placed_order(lines: Vec<NewOrderLine>) -> ManufacturerOrder {
        let order_id = test_order_id();
        let mut order = ManufacturerOrder::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                vendor_id: test_vendor_id(),
                order_date: test_time(),
                expected_arrival: day(14),
                lines,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
        order
    }

    fn receive(order: &mut ManufacturerOrder, receipts: Vec<ReceiptDeclaration>, at: DateTime<Utc>) {
        let events = order
            .handle(&OrderCommand::ReceiveItems(ReceiveItems {
                order_id: order.id_typed(),
                receipts,
                received_by: Some("admin".to_string()),
                occurred_at: at,
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
    }

    fn declare(product: &str, quantity: u32, at: Option<DateTime<Utc>>) -> ReceiptDeclaration {
        ReceiptDeclaration {
            product_id: ProductId::new(product),
            quantity,
            received_at: at,
        }
    }

    #[test]
    fn place_order_computes_total_and_zeroes_received() {
        let order = placed_order(vec![
            widget_line(100, 1000),
            NewOrderLine {
                product_id: ProductId::new("SKU-GEAR"),
                product_name: "Gear".to_string(),
                quantity: 5,
                unit_cost: 250,
            },
        ]);

        assert_eq!(order.status(), OrderStatus::Ordered);
        assert_eq!(order.total_cost(), 100 * 1000 + 5 * 250);
        for line in order.lines() {
            assert_eq!(line.quantity_received, 0);
            assert!(line.deliveries.is_empty());
        }
        assert!(order.receiving_history().is_empty());
    }

    #[test]
    fn place_order_rejects_empty_lines() {
        let order_id = test_order_id();
        let order = ManufacturerOrder::empty(order_id);
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                vendor_id: test_vendor_id(),
                order_date: test_time(),
                expected_arrival: day(14),
                lines: vec![],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn place_order_rejects_zero_quantity_line() {
        let order_id = test_order_id();
        let order = ManufacturerOrder::empty(order_id);
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                vendor_id: test_vendor_id(),
                order_date: test_time(),
                expected_arrival: day(14),
                lines: vec![widget_line(0, 1000)],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn place_order_rejects_duplicate_product() {
        let order_id = test_order_id();
        let order = ManufacturerOrder::empty(order_id);
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                vendor_id: test_vendor_id(),
                order_date: test_time(),
                expected_arrival: day(14),
                lines: vec![widget_line(10, 1000), widget_line(5, 900)],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn partial_then_full_receipt_walks_the_status_machine() {
        // One line {qty: 100, cost: 10.00} -> total 1000.00.
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        assert_eq!(order.total_cost(), 100_000);

        receive(&mut order, vec![declare("SKU-WIDGET", 40, Some(day(1)))], day(1));
        assert_eq!(order.lines()[0].quantity_received, 40);
        assert_eq!(order.lines()[0].deliveries.len(), 1);
        assert_eq!(order.status(), OrderStatus::PartiallyReceived);
        assert_eq!(order.receiving_history().len(), 1);

        receive(&mut order, vec![declare("SKU-WIDGET", 60, Some(day(2)))], day(2));
        assert_eq!(order.lines()[0].quantity_received, 100);
        assert_eq!(order.lines()[0].deliveries.len(), 2);
        assert_eq!(order.status(), OrderStatus::Received);
        assert_eq!(order.receiving_history().len(), 2);
        assert_eq!(order.receiving_history()[1].unit_cost, 1000);
    }

    #[test]
    fn cannot_receive_on_cancelled_order() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        let events = order
            .handle(&OrderCommand::SetStatus(SetStatus {
                order_id: order.id_typed(),
                status: OrderStatus::Cancelled,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
        assert_eq!(order.status(), OrderStatus::Cancelled);

        let before = order.clone();
        let err = order
            .handle(&OrderCommand::ReceiveItems(ReceiveItems {
                order_id: order.id_typed(),
                receipts: vec![declare("SKU-WIDGET", 10, None)],
                received_by: None,
                occurred_at: day(1),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(order, before);
    }

    #[test]
    fn unmatched_and_zero_declarations_are_skipped() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);

        let outcomes = order.classify_receipts(&[
            declare("SKU-WIDGET", 25, None),
            declare("SKU-NOPE", 5, None),
            declare("SKU-WIDGET", 0, None),
        ]);
        assert_eq!(
            outcomes,
            vec![
                ReceiptOutcome::Applied {
                    product_id: ProductId::new("SKU-WIDGET"),
                    quantity: 25,
                },
                ReceiptOutcome::SkippedUnmatched {
                    product_id: ProductId::new("SKU-NOPE"),
                },
                ReceiptOutcome::SkippedZeroQuantity {
                    product_id: ProductId::new("SKU-WIDGET"),
                },
            ]
        );

        receive(
            &mut order,
            vec![
                declare("SKU-WIDGET", 25, None),
                declare("SKU-NOPE", 5, None),
                declare("SKU-WIDGET", 0, None),
            ],
            day(1),
        );
        assert_eq!(order.lines()[0].quantity_received, 25);
        assert_eq!(order.lines()[0].deliveries.len(), 1);
        assert_eq!(order.receiving_history().len(), 1);
        assert_eq!(order.status(), OrderStatus::PartiallyReceived);
    }

    #[test]
    fn all_skipped_batch_emits_no_events() {
        let order = placed_order(vec![widget_line(100, 1000)]);
        let events = order
            .handle(&OrderCommand::ReceiveItems(ReceiveItems {
                order_id: order.id_typed(),
                receipts: vec![declare("SKU-NOPE", 5, None), declare("SKU-WIDGET", 0, None)],
                received_by: None,
                occurred_at: day(1),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn repeated_product_declarations_each_append_a_delivery() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        receive(
            &mut order,
            vec![
                declare("SKU-WIDGET", 10, Some(day(1))),
                declare("SKU-WIDGET", 15, Some(day(1))),
            ],
            day(1),
        );
        assert_eq!(order.lines()[0].quantity_received, 25);
        assert_eq!(order.lines()[0].deliveries.len(), 2);
        assert_eq!(order.receiving_history().len(), 2);
    }

    #[test]
    fn over_receipt_is_accepted_as_declared() {
        let mut order = placed_order(vec![widget_line(10, 1000)]);
        receive(&mut order, vec![declare("SKU-WIDGET", 25, None)], day(1));
        assert_eq!(order.lines()[0].quantity_received, 25);
        assert_eq!(order.status(), OrderStatus::Received);
    }

    #[test]
    fn missing_received_date_defaults_to_batch_time() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        receive(&mut order, vec![declare("SKU-WIDGET", 5, None)], day(3));
        assert_eq!(order.lines()[0].deliveries[0].received_at, day(3));
        assert_eq!(order.receiving_history()[0].received_at, day(3));
    }

    #[test]
    fn in_transit_is_reachable_only_by_override_and_survives_empty_receive() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        let events = order
            .handle(&OrderCommand::SetStatus(SetStatus {
                order_id: order.id_typed(),
                status: OrderStatus::InTransit,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }
        assert_eq!(order.status(), OrderStatus::InTransit);

        // A batch with nothing applied leaves the status untouched.
        receive(&mut order, vec![declare("SKU-NOPE", 3, None)], day(1));
        assert_eq!(order.status(), OrderStatus::InTransit);
    }

    #[test]
    fn status_derivation_is_pure_and_idempotent() {
        let mut order = placed_order(vec![widget_line(100, 1000)]);
        receive(&mut order, vec![declare("SKU-WIDGET", 40, None)], day(1));

        let once = ManufacturerOrder::derive_status(order.status(), order.lines());
        let twice = ManufacturerOrder::derive_status(once, order.lines());
        assert_eq!(once, OrderStatus::PartiallyReceived);
        assert_eq!(once, twice);
    }

    #[test]
    fn receive_on_unknown_order_is_not_found() {
        let order = ManufacturerOrder::empty(test_order_id());
        let err = order
            .handle(&OrderCommand::ReceiveItems(ReceiveItems {
                order_id: order.id_typed(),
                receipts: vec![declare("SKU-WIDGET", 1, None)],
                received_by: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        /// quantity_received always equals the sum of the line's delivery log,
        /// and the history grows by exactly the number of applied declarations.
        #[test]
        fn received_totals_match_delivery_logs(
            batches in proptest::collection::vec(
                proptest::collection::vec((0u32..4, 0u32..50), 1..5),
                0..6,
            )
        ) {
            let products = ["SKU-A", "SKU-B", "SKU-C"];
            let mut order = placed_order(vec![
                NewOrderLine {
                    product_id: ProductId::new("SKU-A"),
                    product_name: "A".to_string(),
                    quantity: 50,
                    unit_cost: 100,
                },
                NewOrderLine {
                    product_id: ProductId::new("SKU-B"),
                    product_name: "B".to_string(),
                    quantity: 30,
                    unit_cost: 250,
                },
            ]);

            let mut expected_history = 0usize;
            for batch in batches {
                let receipts: Vec<_> = batch
                    .iter()
                    .map(|(p, q)| declare(products[*p as usize % products.len()], *q, None))
                    .collect();
                expected_history += receipts
                    .iter()
                    .filter(|r| r.quantity > 0 && r.product_id.as_str() != "SKU-C")
                    .count();
                receive(&mut order, receipts, day(1));
            }

            for line in order.lines() {
                let delivered: u64 = line.deliveries.iter().map(|d| u64::from(d.quantity)).sum();
                prop_assert_eq!(u64::from(line.quantity_received), delivered);
            }
            prop_assert_eq!(order.receiving_history().len(), expected_history);
        }
    }
}
