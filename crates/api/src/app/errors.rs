use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use vendora_infra::command_dispatcher::DispatchError;
use vendora_invoicing::InvoiceStatus;
use vendora_orders::OrderStatus;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_order_status(s: &str) -> Result<OrderStatus, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "ordered" => Ok(OrderStatus::Ordered),
        "in_transit" => Ok(OrderStatus::InTransit),
        "partially_received" => Ok(OrderStatus::PartiallyReceived),
        "received" => Ok(OrderStatus::Received),
        "cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: ordered, in_transit, partially_received, received, cancelled",
        )),
    }
}

pub fn parse_invoice_status(s: &str) -> Result<InvoiceStatus, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(InvoiceStatus::Pending),
        "paid" => Ok(InvoiceStatus::Paid),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: pending, paid",
        )),
    }
}
