use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use vendora_core::AggregateId;
use vendora_inventory::ProductId;
use vendora_orders::{NewOrderLine, OrderId, ReceiptDeclaration};
use vendora_vendors::VendorId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().nest("/orders", orders_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/receive", post(receive_items))
        .route("/:id/status", post(set_status))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let vendor_agg: AggregateId = match body.vendor_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid vendor_id");
        }
    };
    let vendor_id = VendorId::new(vendor_agg);

    let lines = body
        .lines
        .into_iter()
        .map(|l| NewOrderLine {
            product_id: ProductId::new(l.product_id),
            product_name: l.product_name,
            quantity: l.quantity,
            unit_cost: l.unit_cost,
        })
        .collect();

    let order = match services.engine().create_order(
        vendor_id,
        body.order_date,
        body.expected_arrival,
        lines,
    ) {
        Ok(order) => order,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let vendor_name = services.vendor_label(&vendor_id);
    (
        StatusCode::CREATED,
        Json(dto::order_to_json(&order, &vendor_name)),
    )
        .into_response()
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .orders_list()
        .into_iter()
        .map(|rm| {
            let vendor_name = services.vendor_label(&rm.vendor_id);
            dto::order_read_model_to_json(&rm, &vendor_name)
        })
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let order_id = OrderId::new(agg);

    match services.orders_get(&order_id) {
        Some(rm) => {
            let vendor_name = services.vendor_label(&rm.vendor_id);
            (
                StatusCode::OK,
                Json(dto::order_read_model_to_json(&rm, &vendor_name)),
            )
                .into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn receive_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveItemsRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let order_id = OrderId::new(agg);

    let cgst_bp = match dto::percent_to_bp(body.cgst, "cgst") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let sgst_bp = match dto::percent_to_bp(body.sgst, "sgst") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let receipts = body
        .receipts
        .into_iter()
        .map(|r| ReceiptDeclaration {
            product_id: ProductId::new(r.product_id),
            quantity: r.quantity,
            received_at: r.received_at,
        })
        .collect();

    let outcome = match services.engine().receive_items(
        order_id,
        receipts,
        body.discount,
        cgst_bp,
        sgst_bp,
        body.received_by,
    ) {
        Ok(outcome) => outcome,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let vendor_name = outcome
        .order
        .vendor_id()
        .map(|v| services.vendor_label(&v))
        .unwrap_or_default();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order": dto::order_to_json(&outcome.order, &vendor_name),
            "outcomes": outcome.outcomes.iter().map(dto::outcome_to_json).collect::<Vec<_>>(),
            "invoice": outcome.invoice.as_ref().map(dto::invoice_to_json),
        })),
    )
        .into_response()
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let order_id = OrderId::new(agg);

    let status = match errors::parse_order_status(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let order = match services.engine().set_order_status(order_id, status) {
        Ok(order) => order,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let vendor_name = order
        .vendor_id()
        .map(|v| services.vendor_label(&v))
        .unwrap_or_default();
    (
        StatusCode::OK,
        Json(dto::order_to_json(&order, &vendor_name)),
    )
        .into_response()
}
