use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = vendora_api::app::build_app().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The read side is intentionally eventual-consistent (command path vs
/// projection update). Poll briefly until the projection catches up.
async fn get_eventually(
    client: &reqwest::Client,
    url: &str,
    ready: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    for _ in 0..50 {
        let res = client.get(url).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("projection did not catch up within timeout for {url}");
}

#[tokio::test]
async fn health_endpoint_responds() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn order_receiving_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Create an order: 100 units at 10.00.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "vendor_id": Uuid::now_v7().to_string(),
            "order_date": "2024-06-01T00:00:00Z",
            "expected_arrival": "2024-06-15T00:00:00Z",
            "lines": [
                {"product_id": "SKU-1", "product_name": "Widget", "quantity": 100, "unit_cost": 1000}
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: serde_json::Value = res.json().await.unwrap();
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["status"], "ordered");
    assert_eq!(order["total_cost"], 100_000);

    // First batch: 40 units, no discount or tax.
    let res = client
        .post(format!("{}/orders/{}/receive", srv.base_url, order_id))
        .json(&json!({
            "receipts": [
                {"product_id": "SKU-1", "quantity": 40, "received_at": "2024-06-02T00:00:00Z"}
            ],
            "received_by": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "partially_received");
    assert_eq!(body["order"]["lines"][0]["quantity_received"], 40);
    assert_eq!(body["outcomes"][0]["outcome"], "applied");
    assert_eq!(body["invoice"]["sub_total"], 40_000);
    assert_eq!(body["invoice"]["status"], "pending");

    // Second batch: remaining 60 with discount 50.00, CGST 9%, SGST 9%.
    let res = client
        .post(format!("{}/orders/{}/receive", srv.base_url, order_id))
        .json(&json!({
            "receipts": [
                {"product_id": "SKU-1", "quantity": 60, "received_at": "2024-06-03T00:00:00Z"}
            ],
            "discount": 5000,
            "cgst": 9,
            "sgst": 9,
            "received_by": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "received");
    assert_eq!(body["order"]["lines"][0]["quantity_received"], 100);
    assert_eq!(body["invoice"]["sub_total"], 60_000);
    // 600.00 - 50.00 + 54.00 + 54.00 = 658.00
    assert_eq!(body["invoice"]["total_amount"], 65_800);
    let invoice_id = body["invoice"]["id"].as_str().unwrap().to_string();

    // Invoice shows up in the read side.
    let invoice = get_eventually(
        &client,
        &format!("{}/invoices/{}", srv.base_url, invoice_id),
        |_| true,
    )
    .await;
    assert_eq!(invoice["status"], "pending");
    assert_eq!(invoice["vendor_name"], "Unknown Vendor");

    // Pay the invoice; re-reading eventually shows it paid.
    let res = client
        .post(format!("{}/invoices/{}/pay", srv.base_url, invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let paid: serde_json::Value = res.json().await.unwrap();
    assert_eq!(paid["status"], "paid");

    get_eventually(
        &client,
        &format!("{}/invoices/{}", srv.base_url, invoice_id),
        |body| body["status"] == "paid",
    )
    .await;

    // Newest-first listing with a status filter.
    let body = get_eventually(
        &client,
        &format!("{}/invoices?status=pending", srv.base_url),
        |body| body["items"].as_array().is_some_and(|a| a.len() == 1),
    )
    .await;
    assert_eq!(body["items"][0]["sub_total"], 40_000);

    // Orders listing is vendor-populated.
    let body = get_eventually(&client, &format!("{}/orders", srv.base_url), |body| {
        body["items"].as_array().is_some_and(|a| a.len() == 1)
    })
    .await;
    assert_eq!(body["items"][0]["vendor_name"], "Unknown Vendor");
    assert_eq!(body["items"][0]["status"], "received");
}

#[tokio::test]
async fn receiving_against_cancelled_or_unknown_orders_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Unknown order id -> 404.
    let res = client
        .post(format!(
            "{}/orders/{}/receive",
            srv.base_url,
            Uuid::now_v7()
        ))
        .json(&json!({
            "receipts": [{"product_id": "SKU-1", "quantity": 1}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Malformed id -> 400.
    let res = client
        .post(format!("{}/orders/not-a-uuid/receive", srv.base_url))
        .json(&json!({
            "receipts": [{"product_id": "SKU-1", "quantity": 1}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Create, cancel, then receive -> 422.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "vendor_id": Uuid::now_v7().to_string(),
            "order_date": "2024-06-01T00:00:00Z",
            "expected_arrival": "2024-06-15T00:00:00Z",
            "lines": [
                {"product_id": "SKU-1", "product_name": "Widget", "quantity": 10, "unit_cost": 500}
            ],
        }))
        .send()
        .await
        .unwrap();
    let order: serde_json::Value = res.json().await.unwrap();
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/orders/{}/status", srv.base_url, order_id))
        .json(&json!({"status": "cancelled"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "cancelled");

    let res = client
        .post(format!("{}/orders/{}/receive", srv.base_url, order_id))
        .json(&json!({
            "receipts": [{"product_id": "SKU-1", "quantity": 1}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn order_creation_validates_input() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Empty line list -> 400.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "vendor_id": Uuid::now_v7().to_string(),
            "order_date": "2024-06-01T00:00:00Z",
            "expected_arrival": "2024-06-15T00:00:00Z",
            "lines": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Bad vendor id -> 400.
    let res = client
        .post(format!("{}/orders", srv.base_url))
        .json(&json!({
            "vendor_id": "nope",
            "order_date": "2024-06-01T00:00:00Z",
            "expected_arrival": "2024-06-15T00:00:00Z",
            "lines": [
                {"product_id": "SKU-1", "product_name": "Widget", "quantity": 1, "unit_cost": 100}
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
