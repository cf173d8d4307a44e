use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use vendora_core::AggregateId;
use vendora_infra::projections::invoices::InvoiceFilter;
use vendora_invoicing::InvoiceId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().nest("/invoices", invoices_router())
}

fn invoices_router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/pay", post(pay_invoice))
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    /// Case-insensitive vendor-name substring.
    pub vendor: Option<String>,
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListInvoicesQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref() {
        Some(s) => match errors::parse_invoice_status(s) {
            Ok(status) => Some(status),
            Err(resp) => return resp,
        },
        None => None,
    };

    let filter = InvoiceFilter {
        status,
        vendor_name_contains: query.vendor,
    };

    let items = services
        .invoices_list(&filter)
        .iter()
        .map(dto::invoice_read_model_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };
    let invoice_id = InvoiceId::new(agg);

    match services.invoices_get(&invoice_id) {
        Some(rm) => (StatusCode::OK, Json(dto::invoice_read_model_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn pay_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };
    let invoice_id = InvoiceId::new(agg);

    let invoice = match services.engine().pay_invoice(invoice_id) {
        Ok(invoice) => invoice,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response()
}
