use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use vendora_infra::projections::{invoices::InvoiceReadModel, orders::OrderReadModel};
use vendora_invoicing::{InvoiceLine, VendorInvoice};
use vendora_orders::{Delivery, ManufacturerOrder, OrderLine, ReceiptEntry, ReceiptOutcome};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    /// Cost per unit in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub vendor_id: String,
    pub order_date: DateTime<Utc>,
    pub expected_arrival: DateTime<Utc>,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub product_id: String,
    pub quantity: u32,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveItemsRequest {
    pub receipts: Vec<ReceiptRequest>,
    /// Flat discount in smallest currency unit.
    #[serde(default)]
    pub discount: u64,
    /// Central tax rate in percent (e.g. 9 or 2.5).
    #[serde(default)]
    pub cgst: f64,
    /// State tax rate in percent.
    #[serde(default)]
    pub sgst: f64,
    pub received_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// Convert a percent rate from the wire into basis points.
pub fn percent_to_bp(percent: f64, field: &'static str) -> Result<u32, axum::response::Response> {
    if !percent.is_finite() || percent < 0.0 || percent > 10_000.0 {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_rate",
            format!("{field} must be a non-negative percentage"),
        ));
    }
    Ok((percent * 100.0).round() as u32)
}

// -------------------------
// JSON mapping helpers
// -------------------------

fn status_json<T: serde::Serialize>(status: &T) -> JsonValue {
    serde_json::to_value(status).unwrap_or(JsonValue::Null)
}

fn delivery_to_json(d: &Delivery) -> JsonValue {
    serde_json::json!({
        "quantity": d.quantity,
        "received_at": d.received_at.to_rfc3339(),
        "received_by": d.received_by,
    })
}

fn order_line_to_json(l: &OrderLine) -> JsonValue {
    serde_json::json!({
        "product_id": l.product_id.as_str(),
        "product_name": l.product_name,
        "quantity_ordered": l.quantity_ordered,
        "quantity_received": l.quantity_received,
        "unit_cost": l.unit_cost,
        "deliveries": l.deliveries.iter().map(delivery_to_json).collect::<Vec<_>>(),
    })
}

fn receipt_entry_to_json(e: &ReceiptEntry) -> JsonValue {
    serde_json::json!({
        "product_id": e.product_id.as_str(),
        "quantity": e.quantity,
        "received_at": e.received_at.to_rfc3339(),
        "unit_cost": e.unit_cost,
        "received_by": e.received_by,
    })
}

/// JSON view of a freshly mutated order (straight from the aggregate).
pub fn order_to_json(order: &ManufacturerOrder, vendor_name: &str) -> JsonValue {
    serde_json::json!({
        "id": order.id_typed().to_string(),
        "vendor_id": order.vendor_id().map(|v| v.to_string()),
        "vendor_name": vendor_name,
        "status": status_json(&order.status()),
        "order_date": order.order_date().to_rfc3339(),
        "expected_arrival": order.expected_arrival().to_rfc3339(),
        "total_cost": order.total_cost(),
        "lines": order.lines().iter().map(order_line_to_json).collect::<Vec<_>>(),
        "receiving_history": order.receiving_history().iter().map(receipt_entry_to_json).collect::<Vec<_>>(),
    })
}

/// JSON view of an order read model (listings and gets).
pub fn order_read_model_to_json(rm: &OrderReadModel, vendor_name: &str) -> JsonValue {
    serde_json::json!({
        "id": rm.order_id.to_string(),
        "vendor_id": rm.vendor_id.to_string(),
        "vendor_name": vendor_name,
        "status": status_json(&rm.status),
        "order_date": rm.order_date.to_rfc3339(),
        "expected_arrival": rm.expected_arrival.to_rfc3339(),
        "total_cost": rm.total_cost,
        "lines": rm.lines.iter().map(order_line_to_json).collect::<Vec<_>>(),
        "receiving_history": rm.receiving_history.iter().map(receipt_entry_to_json).collect::<Vec<_>>(),
        "placed_at": rm.placed_at.to_rfc3339(),
    })
}

pub fn outcome_to_json(outcome: &ReceiptOutcome) -> JsonValue {
    serde_json::to_value(outcome).unwrap_or(JsonValue::Null)
}

fn invoice_line_to_json(l: &InvoiceLine) -> JsonValue {
    serde_json::json!({
        "product_id": l.product_id.as_str(),
        "product_name": l.product_name,
        "quantity": l.quantity,
        "unit_cost": l.unit_cost,
        "line_total": l.line_total,
    })
}

fn bp_to_percent(bp: u32) -> f64 {
    f64::from(bp) / 100.0
}

/// JSON view of a freshly mutated invoice (straight from the aggregate).
pub fn invoice_to_json(invoice: &VendorInvoice) -> JsonValue {
    serde_json::json!({
        "id": invoice.id_typed().to_string(),
        "order_id": invoice.order_id().map(|o| o.to_string()),
        "vendor_name": invoice.vendor_name(),
        "status": status_json(&invoice.status()),
        "lines": invoice.lines().iter().map(invoice_line_to_json).collect::<Vec<_>>(),
        "sub_total": invoice.sub_total(),
        "discount": invoice.discount(),
        "cgst": bp_to_percent(invoice.cgst_bp()),
        "sgst": bp_to_percent(invoice.sgst_bp()),
        "total_amount": invoice.total_amount(),
        "invoice_date": invoice.invoice_date().to_rfc3339(),
    })
}

/// JSON view of an invoice read model (listings and gets).
pub fn invoice_read_model_to_json(rm: &InvoiceReadModel) -> JsonValue {
    serde_json::json!({
        "id": rm.invoice_id.to_string(),
        "order_id": rm.order_id.to_string(),
        "vendor_name": rm.vendor_name,
        "status": status_json(&rm.status),
        "lines": rm.lines.iter().map(invoice_line_to_json).collect::<Vec<_>>(),
        "sub_total": rm.sub_total,
        "discount": rm.discount,
        "cgst": bp_to_percent(rm.cgst_bp),
        "sgst": bp_to_percent(rm.sgst_bp),
        "total_amount": rm.total_amount,
        "invoice_date": rm.invoice_date.to_rfc3339(),
        "issued_at": rm.issued_at.to_rfc3339(),
    })
}
