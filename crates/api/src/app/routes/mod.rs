use axum::Router;

pub mod invoices;
pub mod orders;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .merge(orders::router())
        .merge(invoices::router())
}
