//! `vendora-invoicing` — vendor payable invoices.
//!
//! One invoice is generated per receiving batch (never per order). Invoices
//! are immutable historical snapshots: they reference the source order by
//! identifier but never change when the order later does.

pub mod invoice;

pub use invoice::{
    InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceLine, InvoiceLineSpec, InvoicePaid,
    InvoiceStatus, IssueInvoice, MarkPaid, VendorInvoice, VendorInvoiceCommand, invoice_total,
};
