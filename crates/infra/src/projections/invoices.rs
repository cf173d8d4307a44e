use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use vendora_core::AggregateId;
use vendora_events::EventEnvelope;
use vendora_invoicing::{InvoiceEvent, InvoiceId, InvoiceLine, InvoiceStatus};
use vendora_orders::OrderId;

use crate::read_model::Store;

/// Queryable vendor-invoice read model (header + lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub order_id: OrderId,
    pub vendor_name: String,
    pub status: InvoiceStatus,
    pub lines: Vec<InvoiceLine>,
    pub sub_total: u64,
    pub discount: u64,
    pub cgst_bp: u32,
    pub sgst_bp: u32,
    pub total_amount: i64,
    pub invoice_date: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

/// Listing filter: exact status and/or case-insensitive vendor-name substring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub vendor_name_contains: Option<String>,
}

impl InvoiceFilter {
    fn matches(&self, rm: &InvoiceReadModel) -> bool {
        if let Some(status) = self.status {
            if rm.status != status {
                return false;
            }
        }
        if let Some(ref needle) = self.vendor_name_contains {
            if !rm
                .vendor_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Error)]
pub enum InvoiceProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),

    #[error("event invoice_id does not match envelope aggregate_id")]
    AggregateMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Vendor invoices projection.
///
/// Idempotent under at-least-once delivery: replays at or below the
/// per-stream cursor are ignored.
#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: Store<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> InvoicesProjection<S>
where
    S: Store<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(invoice_id)
    }

    /// Matching invoices, newest first.
    pub fn list(&self, filter: &InvoiceFilter) -> Vec<InvoiceReadModel> {
        let mut invoices: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|rm| filter.matches(rm))
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        invoices
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InvoiceProjectionError> {
        if envelope.aggregate_type() != "invoicing.vendor_invoice" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let Ok(mut cursors) = self.cursors.write() else {
            return Ok(());
        };
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceProjectionError::Deserialize(e.to_string()))?;

        let invoice_id = match &ev {
            InvoiceEvent::InvoiceIssued(e) => e.invoice_id,
            InvoiceEvent::InvoicePaid(e) => e.invoice_id,
        };
        if invoice_id.0 != aggregate_id {
            return Err(InvoiceProjectionError::AggregateMismatch);
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        order_id: e.order_id,
                        vendor_name: e.vendor_name,
                        status: InvoiceStatus::Pending,
                        lines: e.lines,
                        sub_total: e.sub_total,
                        discount: e.discount,
                        cgst_bp: e.cgst_bp,
                        sgst_bp: e.sgst_bp,
                        total_amount: e.total_amount,
                        invoice_date: e.invoice_date,
                        issued_at: e.occurred_at,
                    },
                );
            }
            InvoiceEvent::InvoicePaid(e) => {
                let Some(mut rm) = self.store.get(&e.invoice_id) else {
                    return Ok(());
                };
                rm.status = InvoiceStatus::Paid;
                self.store.upsert(e.invoice_id, rm);
            }
        }

        // Advance cursor after successful apply.
        cursors.insert(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), InvoiceProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
