use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendora_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use vendora_events::Event;
use vendora_inventory::ProductId;
use vendora_orders::OrderId;

/// Vendor invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle: a single Pending -> Paid transition, no reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

/// Line input at issue time; totals are computed by the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineSpec {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Cost per unit in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
}

/// Snapshot of one received line as billed in this invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_cost: u64,
    pub line_total: u64,
}

/// Payable total for a batch subtotal.
///
/// Both tax rates (basis points) apply to the **pre-discount** subtotal and
/// the flat discount subtracts independently, so the result does not depend
/// on any ordering of the three adjustments. A discount larger than subtotal
/// plus taxes yields a negative payable.
pub fn invoice_total(
    sub_total: u64,
    discount: u64,
    cgst_bp: u32,
    sgst_bp: u32,
) -> Result<i64, DomainError> {
    let sub = i128::from(sub_total);
    let cgst_amount = sub * i128::from(cgst_bp) / 10_000;
    let sgst_amount = sub * i128::from(sgst_bp) / 10_000;
    let total = sub - i128::from(discount) + cgst_amount + sgst_amount;

    i64::try_from(total).map_err(|_| DomainError::invariant("invoice total overflow"))
}

/// Aggregate root: VendorInvoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorInvoice {
    id: InvoiceId,
    order_id: Option<OrderId>,
    vendor_name: String,
    lines: Vec<InvoiceLine>,
    sub_total: u64,
    discount: u64,
    cgst_bp: u32,
    sgst_bp: u32,
    total_amount: i64,
    invoice_date: DateTime<Utc>,
    issued_at: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    version: u64,
    created: bool,
}

impl VendorInvoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            order_id: None,
            vendor_name: String::new(),
            lines: Vec::new(),
            sub_total: 0,
            discount: 0,
            cgst_bp: 0,
            sgst_bp: 0,
            total_amount: 0,
            invoice_date: DateTime::<Utc>::MIN_UTC,
            issued_at: None,
            status: InvoiceStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn sub_total(&self) -> u64 {
        self.sub_total
    }

    pub fn discount(&self) -> u64 {
        self.discount
    }

    pub fn cgst_bp(&self) -> u32 {
        self.cgst_bp
    }

    pub fn sgst_bp(&self) -> u32 {
        self.sgst_bp
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    pub fn invoice_date(&self) -> DateTime<Utc> {
        self.invoice_date
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }
}

impl AggregateRoot for VendorInvoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice (one per non-empty receiving batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub invoice_id: InvoiceId,
    pub order_id: OrderId,
    pub vendor_name: String,
    pub lines: Vec<InvoiceLineSpec>,
    /// Flat discount in smallest currency unit.
    pub discount: u64,
    /// Central tax rate in basis points (1 bp = 0.01%).
    pub cgst_bp: u32,
    /// State tax rate in basis points.
    pub sgst_bp: u32,
    /// Dated to the receiving event, not to processing time.
    pub invoice_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaid {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorInvoiceCommand {
    IssueInvoice(IssueInvoice),
    MarkPaid(MarkPaid),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub order_id: OrderId,
    pub vendor_name: String,
    pub lines: Vec<InvoiceLine>,
    pub sub_total: u64,
    pub discount: u64,
    pub cgst_bp: u32,
    pub sgst_bp: u32,
    pub total_amount: i64,
    pub invoice_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoicePaid(InvoicePaid),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.vendor_invoice.issued",
            InvoiceEvent::InvoicePaid(_) => "invoicing.vendor_invoice.paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for VendorInvoice {
    type Command = VendorInvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.order_id = Some(e.order_id);
                self.vendor_name = e.vendor_name.clone();
                self.lines = e.lines.clone();
                self.sub_total = e.sub_total;
                self.discount = e.discount;
                self.cgst_bp = e.cgst_bp;
                self.sgst_bp = e.sgst_bp;
                self.total_amount = e.total_amount;
                self.invoice_date = e.invoice_date;
                self.issued_at = Some(e.occurred_at);
                self.status = InvoiceStatus::Pending;
                self.created = true;
            }
            InvoiceEvent::InvoicePaid(_) => {
                self.status = InvoiceStatus::Paid;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VendorInvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            VendorInvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
        }
    }
}

impl VendorInvoice {
    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut sub_total: u64 = 0;
        for spec in &cmd.lines {
            if spec.quantity == 0 {
                return Err(DomainError::validation(
                    "invoice line quantity must be positive",
                ));
            }
            let line_total = u64::from(spec.quantity)
                .checked_mul(spec.unit_cost)
                .ok_or_else(|| DomainError::invariant("invoice line amount overflow"))?;
            sub_total = sub_total
                .checked_add(line_total)
                .ok_or_else(|| DomainError::invariant("invoice subtotal overflow"))?;
            lines.push(InvoiceLine {
                product_id: spec.product_id.clone(),
                product_name: spec.product_name.clone(),
                quantity: spec.quantity,
                unit_cost: spec.unit_cost,
                line_total,
            });
        }

        if sub_total == 0 {
            return Err(DomainError::validation("invoice subtotal must be positive"));
        }

        let total_amount = invoice_total(sub_total, cmd.discount, cmd.cgst_bp, cmd.sgst_bp)?;

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: cmd.invoice_id,
            order_id: cmd.order_id,
            vendor_name: cmd.vendor_name.clone(),
            lines,
            sub_total,
            discount: cmd.discount,
            cgst_bp: cmd.cgst_bp,
            sgst_bp: cmd.sgst_bp,
            total_amount,
            invoice_date: cmd.invoice_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkPaid) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_invoice_id(cmd.invoice_id)?;

        // Already paid: idempotent no-op, the stream doesn't grow.
        if self.status == InvoiceStatus::Paid {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceEvent::InvoicePaid(InvoicePaid {
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 12, 10, 30, 0).unwrap()
    }

    fn widget_spec(quantity: u32, unit_cost: u64) -> InvoiceLineSpec {
        InvoiceLineSpec {
            product_id: ProductId::new("SKU-WIDGET"),
            product_name: "Widget".to_string(),
            quantity,
            unit_cost,
        }
    }

    fn issue_cmd(
        invoice_id: InvoiceId,
        lines: Vec<InvoiceLineSpec>,
        discount: u64,
        cgst_bp: u32,
        sgst_bp: u32,
    ) -> IssueInvoice {
        IssueInvoice {
            invoice_id,
            order_id: test_order_id(),
            vendor_name: "Acme Components".to_string(),
            lines,
            discount,
            cgst_bp,
            sgst_bp,
            invoice_date: test_time(),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn issue_computes_subtotal_discount_and_dual_tax() {
        let invoice_id = test_invoice_id();
        let mut invoice = VendorInvoice::empty(invoice_id);

        // 60 units at 10.00 with discount 50.00, CGST 9%, SGST 9%:
        // 600.00 - 50.00 + 54.00 + 54.00 = 658.00.
        let cmd = issue_cmd(invoice_id, vec![widget_spec(60, 1000)], 5000, 900, 900);
        let events = invoice
            .handle(&VendorInvoiceCommand::IssueInvoice(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        invoice.apply(&events[0]);

        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.sub_total(), 60_000);
        assert_eq!(invoice.total_amount(), 65_800);
        assert_eq!(invoice.lines().len(), 1);
        assert_eq!(invoice.lines()[0].line_total, 60_000);
    }

    #[test]
    fn issue_rejects_empty_lines_and_zero_subtotal() {
        let invoice_id = test_invoice_id();
        let invoice = VendorInvoice::empty(invoice_id);

        let err = invoice
            .handle(&VendorInvoiceCommand::IssueInvoice(issue_cmd(
                invoice_id,
                vec![],
                0,
                0,
                0,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = invoice
            .handle(&VendorInvoiceCommand::IssueInvoice(issue_cmd(
                invoice_id,
                vec![widget_spec(5, 0)],
                0,
                0,
                0,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn discount_beyond_subtotal_and_taxes_goes_negative() {
        let invoice_id = test_invoice_id();
        let mut invoice = VendorInvoice::empty(invoice_id);

        let cmd = issue_cmd(invoice_id, vec![widget_spec(1, 100)], 1_000, 0, 0);
        let events = invoice
            .handle(&VendorInvoiceCommand::IssueInvoice(cmd))
            .unwrap();
        invoice.apply(&events[0]);

        assert_eq!(invoice.total_amount(), -900);
    }

    #[test]
    fn paying_transitions_once_and_repays_are_noops() {
        let invoice_id = test_invoice_id();
        let mut invoice = VendorInvoice::empty(invoice_id);

        let cmd = issue_cmd(invoice_id, vec![widget_spec(2, 500)], 0, 0, 0);
        let events = invoice
            .handle(&VendorInvoiceCommand::IssueInvoice(cmd))
            .unwrap();
        invoice.apply(&events[0]);

        let pay = MarkPaid {
            invoice_id,
            occurred_at: test_time(),
        };
        let events = invoice
            .handle(&VendorInvoiceCommand::MarkPaid(pay.clone()))
            .unwrap();
        assert_eq!(events.len(), 1);
        invoice.apply(&events[0]);
        assert_eq!(invoice.status(), InvoiceStatus::Paid);

        let events = invoice.handle(&VendorInvoiceCommand::MarkPaid(pay)).unwrap();
        assert!(events.is_empty());
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn paying_unknown_invoice_is_not_found() {
        let invoice = VendorInvoice::empty(test_invoice_id());
        let err = invoice
            .handle(&VendorInvoiceCommand::MarkPaid(MarkPaid {
                invoice_id: invoice.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        /// total == S - D + S*C + S*Sg regardless of the magnitudes involved;
        /// taxes always apply to the pre-discount subtotal.
        #[test]
        fn total_formula_holds(
            sub_total in 1u64..10_000_000,
            discount in 0u64..20_000_000,
            cgst_bp in 0u32..5_000,
            sgst_bp in 0u32..5_000,
        ) {
            let total = invoice_total(sub_total, discount, cgst_bp, sgst_bp).unwrap();

            let sub = i128::from(sub_total);
            let expected = sub - i128::from(discount)
                + sub * i128::from(cgst_bp) / 10_000
                + sub * i128::from(sgst_bp) / 10_000;
            prop_assert_eq!(i128::from(total), expected);
        }
    }
}
