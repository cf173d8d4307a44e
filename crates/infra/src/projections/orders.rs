use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use vendora_core::AggregateId;
use vendora_events::EventEnvelope;
use vendora_orders::{
    Delivery, ManufacturerOrder, OrderEvent, OrderId, OrderLine, OrderStatus, ReceiptEntry,
};
use vendora_vendors::VendorId;

use crate::read_model::Store;

/// Queryable manufacturer-order read model (header + lines + history).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub expected_arrival: DateTime<Utc>,
    pub total_cost: u64,
    pub lines: Vec<OrderLine>,
    pub receiving_history: Vec<ReceiptEntry>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum OrderProjectionError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),

    #[error("event order_id does not match envelope aggregate_id")]
    AggregateMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Manufacturer orders projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a queryable
/// read model. Idempotent under at-least-once delivery: replays at or below
/// the per-stream cursor are ignored.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: Store<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrdersProjection<S>
where
    S: Store<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    /// All orders, newest first.
    pub fn list(&self) -> Vec<OrderReadModel> {
        let mut orders = self.store.list();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), OrderProjectionError> {
        if envelope.aggregate_type() != "orders.manufacturer_order" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let Ok(mut cursors) = self.cursors.write() else {
            return Ok(());
        };
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(OrderProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(OrderProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::BatchReceived(e) => e.order_id,
            OrderEvent::StatusOverridden(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(OrderProjectionError::AggregateMismatch);
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        vendor_id: e.vendor_id,
                        status: OrderStatus::Ordered,
                        order_date: e.order_date,
                        expected_arrival: e.expected_arrival,
                        total_cost: e.total_cost,
                        lines: e
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
                            .collect(),
                        receiving_history: Vec::new(),
                        placed_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::BatchReceived(e) => {
                let Some(mut rm) = self.store.get(&e.order_id) else {
                    // Batch before placement means a gap upstream; nothing to update.
                    return Ok(());
                };
                for entry in &e.entries {
                    let Some(line) = rm
                        .lines
                        .iter_mut()
                        .find(|l| l.product_id == entry.product_id)
                    else {
                        continue;
                    };
                    line.quantity_received = line.quantity_received.saturating_add(entry.quantity);
                    line.deliveries.push(Delivery {
                        quantity: entry.quantity,
                        received_at: entry.received_at,
                        received_by: entry.received_by.clone(),
                    });
                    rm.receiving_history.push(entry.clone());
                }
                rm.status = ManufacturerOrder::derive_status(rm.status, &rm.lines);
                self.store.upsert(e.order_id, rm);
            }
            OrderEvent::StatusOverridden(e) => {
                let Some(mut rm) = self.store.get(&e.order_id) else {
                    return Ok(());
                };
                rm.status = e.status;
                self.store.upsert(e.order_id, rm);
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
    ) -> Result<(), OrderProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
