use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use distributor_api::{router, AppState, AttachmentStore, MemoryStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "distributor-test-boundary";

struct TestApp {
    router: Router,
    uploads: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let state = AppState::new(Arc::new(MemoryStore::new()), AttachmentStore::new(uploads.path()));
        TestApp {
            router: router(state, 10 * 1024 * 1024),
            uploads,
        }
    }

    fn folder(&self, name: &str) -> PathBuf {
        self.uploads.path().join(name)
    }

    fn files_in(&self, name: &str) -> Vec<PathBuf> {
        match std::fs::read_dir(self.folder(name)) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Multipart body builder.
#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn request(mut self, method: Method, uri: &str) -> Request<Body> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(self.body))
            .unwrap()
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method(Method::DELETE).uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, bytes)
}

async fn request_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(router, request).await;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn items_json(items: &[(&str, &str)]) -> String {
    let items: Vec<Value> = items
        .iter()
        .map(|(code, total)| json!({ "productCode": code, "quantity": 1, "price": total, "taxPrice": 0, "total": total }))
        .collect();
    Value::Array(items).to_string()
}

async fn create_sales_order(app: &TestApp, form: Form) -> Value {
    let (status, body) = request_json(&app.router, form.request(Method::POST, "/api/SalesOrders")).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn order_numbers_are_sequential_per_document_type() {
    let app = TestApp::new();
    let first = create_sales_order(&app, Form::default().text("salesItemsJson", &items_json(&[("P1", "10")]))).await;
    let second = create_sales_order(
        &app,
        Form::default()
            .text("salesOrderNo", "SO-9999999")
            .text("salesItemsJson", &items_json(&[("P1", "10")])),
    )
    .await;
    assert_eq!(first["salesOrderNo"], "SO-1000001");
    assert_eq!(second["salesOrderNo"], "SO-1000002");

    let (status, po) = request_json(
        &app.router,
        Form::default()
            .text("vendorName", "Globex")
            .text("purchaseItemsJson", &items_json(&[("P2", "5")]))
            .request(Method::POST, "/api/PurchaseOrders"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(po["data"]["purchaseOrderNo"], "PO-2000001");
}

#[tokio::test]
async fn create_requires_a_non_empty_items_list() {
    let app = TestApp::new();
    for form in [
        Form::default().text("customerName", "Acme"),
        Form::default().text("salesItemsJson", "not json"),
        Form::default().text("salesItemsJson", "[]"),
    ] {
        let (status, body) = request_json(&app.router, form.request(Method::POST, "/api/SalesOrders")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
    let (_, list) = request_json(&app.router, get("/api/SalesOrders")).await;
    assert_eq!(list["meta"]["count"], 0);
}

#[tokio::test]
async fn update_replaces_every_line_item() {
    let app = TestApp::new();
    let order = create_sales_order(
        &app,
        Form::default().text("salesItemsJson", &items_json(&[("A", "1"), ("B", "2"), ("C", "3")])),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();
    let old_ids: Vec<Value> = order["salesOrderItems"].as_array().unwrap().iter().map(|i| i["id"].clone()).collect();
    assert_eq!(old_ids.len(), 3);

    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("SalesItemsJson", r#"[{"ProductCode":"X","Total":"7.50"},{"product_code":"Y","total":2}]"#)
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, fetched) = request_json(&app.router, get(&format!("/api/SalesOrders/{id}"))).await;
    let items = fetched["data"]["salesOrderItems"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["productCode"], "X");
    assert_eq!(items[1]["productCode"], "Y");
    assert!(items.iter().all(|i| !old_ids.contains(&i["id"])));
    assert_eq!(fetched["data"]["orderTotal"], "9.50");
}

#[tokio::test]
async fn sales_update_merges_header_and_keeps_number() {
    let app = TestApp::new();
    let order = create_sales_order(
        &app,
        Form::default()
            .text("customerName", "Acme")
            .text("salesRemarks", "first")
            .text("soDate", "2024-05-01")
            .text("salesItemsJson", &items_json(&[("A", "1")])),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();
    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("salesRemarks", "second")
            .text("salesOrderNo", "SO-1")
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["salesOrderNo"], order["salesOrderNo"]);
    assert_eq!(data["customerName"], "Acme");
    assert_eq!(data["salesRemarks"], "second");
    assert_eq!(data["salesOrderItems"].as_array().unwrap().len(), 1);
    assert!(data["soDate"].as_str().unwrap().starts_with("2024-05-01"));
}

#[tokio::test]
async fn purchase_update_overwrites_header() {
    let app = TestApp::new();
    let (_, created) = request_json(
        &app.router,
        Form::default()
            .text("vendorName", "Globex")
            .text("purchaseRemarks", "urgent")
            .text("purchaseItemsJson", &items_json(&[("A", "1")]))
            .request(Method::POST, "/api/PurchaseOrders"),
    )
    .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("vendorName", "Initech")
            .request(Method::PUT, &format!("/api/PurchaseOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vendorName"], "Initech");
    assert_eq!(body["data"]["purchaseRemarks"], Value::Null);
    assert_eq!(body["data"]["purchaseItems"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stale_row_version_is_a_conflict() {
    let app = TestApp::new();
    let order = create_sales_order(&app, Form::default().text("salesItemsJson", &items_json(&[("A", "1")]))).await;
    let id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["rowVersion"], 1);

    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("rowVersion", "1")
            .text("salesRemarks", "first writer")
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rowVersion"], 2);

    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("rowVersion", "1")
            .text("salesRemarks", "second writer")
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (_, fetched) = request_json(&app.router, get(&format!("/api/SalesOrders/{id}"))).await;
    assert_eq!(fetched["data"]["salesRemarks"], "first writer");
}

#[tokio::test]
async fn attachments_upload_download_and_removal() {
    let app = TestApp::new();
    let order = create_sales_order(
        &app,
        Form::default()
            .text("salesItemsJson", &items_json(&[("A", "1")]))
            .file("uploadedFiles", "quote.txt", "text/plain", b"hello")
            .file("uploadedFiles", "empty.txt", "text/plain", b""),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();
    let attachments = order["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    let url = attachments[0]["downloadUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/api/SalesOrders/attachment/"));

    let (status, headers, bytes) = send(&app.router, get(&url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert!(headers[header::CONTENT_DISPOSITION].to_str().unwrap().contains("quote.txt"));

    let attachment_id = attachments[0]["id"].as_str().unwrap().to_string();
    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("filesToDelete", &attachment_id)
            .file("uploadedFiles", "po.pdf", "application/pdf", b"%PDF")
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let remaining = body["data"]["attachments"].as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["fileName"], "po.pdf");
    assert_eq!(app.files_in("sales_orders").len(), 1);

    let (status, _) = request_json(&app.router, get(&url)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn files_to_delete_ignores_other_orders() {
    let app = TestApp::new();
    let first = create_sales_order(
        &app,
        Form::default()
            .text("salesItemsJson", &items_json(&[("A", "1")]))
            .file("uploadedFiles", "keep.txt", "text/plain", b"keep"),
    )
    .await;
    let second = create_sales_order(&app, Form::default().text("salesItemsJson", &items_json(&[("B", "1")]))).await;
    let foreign = first["attachments"][0]["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    let (status, _) = request_json(
        &app.router,
        Form::default()
            .text("filesToDeleteJson", &json!([foreign]).to_string())
            .request(Method::PUT, &format!("/api/SalesOrders/{second_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, bytes) = send(&app.router, get(&format!("/api/SalesOrders/attachment/{foreign}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"keep");
}

#[tokio::test]
async fn download_of_externally_removed_file_is_not_found() {
    let app = TestApp::new();
    let (_, created) = request_json(
        &app.router,
        Form::default()
            .text("purchaseItemsJson", &items_json(&[("A", "1")]))
            .file("uploadedFiles", "drawing.txt", "text/plain", b"data")
            .request(Method::POST, "/api/PurchaseOrders"),
    )
    .await;
    let url = created["data"]["attachments"][0]["downloadUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/api/PurchaseOrders/attachment/"));
    for path in app.files_in("purchase_orders") {
        std::fs::remove_file(path).unwrap();
    }
    let (status, body) = request_json(&app.router, get(&url)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn delete_order_removes_rows_and_files_even_when_some_are_missing() {
    let app = TestApp::new();
    let order = create_sales_order(
        &app,
        Form::default()
            .text("salesItemsJson", &items_json(&[("A", "1"), ("B", "2")]))
            .file("uploadedFiles", "one.txt", "text/plain", b"1")
            .file("files", "two.txt", "text/plain", b"2"),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();
    let urls: Vec<String> = order["attachments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["downloadUrl"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls.len(), 2);
    let files = app.files_in("sales_orders");
    assert_eq!(files.len(), 2);
    std::fs::remove_file(&files[0]).unwrap();

    let (status, _) = request_json(&app.router, delete(&format!("/api/SalesOrders/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.files_in("sales_orders").is_empty());

    let (status, _) = request_json(&app.router, get(&format!("/api/SalesOrders/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    for url in urls {
        let (status, _) = request_json(&app.router, get(&url)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = request_json(&app.router, delete(&format!("/api/SalesOrders/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_lists_filter_and_shape() {
    let app = TestApp::new();
    for name in ["Acme Traders", "Globex"] {
        create_sales_order(
            &app,
            Form::default().text("customerName", name).text("salesItemsJson", &items_json(&[("A", "1")])),
        )
        .await;
    }
    let (_, all) = request_json(&app.router, get("/api/SalesOrders")).await;
    assert_eq!(all["meta"]["count"], 2);
    assert_eq!(all["data"][0]["customerName"], "Globex");

    let (_, filtered) = request_json(&app.router, get("/api/SalesOrders?customerName=acme")).await;
    assert_eq!(filtered["meta"]["count"], 1);
    let (_, by_no) = request_json(&app.router, get("/api/SalesOrders?salesOrderNo=so-1000002")).await;
    assert_eq!(by_no["data"][0]["customerName"], "Globex");

    for (vendor, date) in [("Old", "2024-01-01"), ("New", "2024-06-01")] {
        request_json(
            &app.router,
            Form::default()
                .text("vendorName", vendor)
                .text("poDate", date)
                .text("purchaseItemsJson", &items_json(&[("A", "4.25")]))
                .request(Method::POST, "/api/PurchaseOrders"),
        )
        .await;
    }
    let (_, purchases) = request_json(&app.router, get("/api/PurchaseOrders")).await;
    assert_eq!(purchases["data"][0]["vendorName"], "New");
    assert_eq!(purchases["data"][0]["orderTotal"], "4.25");
    assert!(purchases["data"][0].get("purchaseItems").is_none());
}

#[tokio::test]
async fn resource_crud_round() {
    let app = TestApp::new();
    let (status, headers, bytes) = send(
        &app.router,
        json_request(Method::POST, "/api/SalesEmployee", json!({ "name": "  Asha " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::LOCATION], "/api/SalesEmployee/1");
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(created["data"], json!({ "id": 1, "name": "Asha" }));

    let (status, body) = request_json(
        &app.router,
        json_request(Method::PUT, "/api/SalesEmployee/1", json!({ "id": 1, "name": "Asha R" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Asha R");

    let (status, body) = request_json(
        &app.router,
        json_request(Method::PUT, "/api/SalesEmployee/1", json!({ "id": 2, "name": "Other" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = request_json(
        &app.router,
        json_request(Method::PUT, "/api/SalesEmployee/42", json!({ "name": "Ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request_json(&app.router, delete("/api/SalesEmployee/1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request_json(&app.router, get("/api/SalesEmployee/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = request_json(&app.router, get("/api/SalesEmployee/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicates_are_rejected_ignoring_case() {
    let app = TestApp::new();
    let cases = [
        ("/api/Customer", json!({ "code": "abc", "name": "One" }), json!({ "code": "ABC", "name": "Two" }), "code"),
        ("/api/UOMGroups", json!({ "name": "Box" }), json!({ "name": "bOX" }), "name"),
        ("/api/SalesEmployee", json!({ "name": "Asha" }), json!({ "name": "ASHA" }), "name"),
    ];
    for (path, first, second, field) in cases {
        let (status, _) = request_json(&app.router, json_request(Method::POST, path, first)).await;
        assert_eq!(status, StatusCode::CREATED, "{path}");
        let (status, body) = request_json(&app.router, json_request(Method::POST, path, second)).await;
        assert_eq!(status, StatusCode::CONFLICT, "{path}");
        assert_eq!(body["error"]["code"], "duplicate");
        assert!(body["error"]["details"][field].is_array());
    }
}

#[tokio::test]
async fn validation_errors_list_fields() {
    let app = TestApp::new();
    let (status, body) = request_json(
        &app.router,
        json_request(Method::POST, "/api/Customer", json!({ "code": "", "mailId": "nope", "gstin": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    let details = &body["error"]["details"];
    for field in ["code", "name", "mailId", "gstin"] {
        assert!(details[field].is_array(), "{field}: {details}");
    }

    let (status, body) = request_json(
        &app.router,
        Request::builder()
            .method(Method::POST)
            .uri("/api/Customer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn customer_used_by_sales_order_cannot_be_deleted() {
    let app = TestApp::new();
    let (_, customer) = request_json(
        &app.router,
        json_request(Method::POST, "/api/Customer", json!({ "code": "C1", "name": "Acme" })),
    )
    .await;
    let customer_id = customer["data"]["id"].as_i64().unwrap();

    let order = create_sales_order(
        &app,
        Form::default()
            .text("CustomerCode", "c1")
            .text("salesItemsJson", &items_json(&[("A", "1")])),
    )
    .await;
    assert_eq!(order["customerId"], customer_id);
    assert_eq!(order["customerName"], "Acme");

    let (status, body) = request_json(&app.router, delete(&format!("/api/Customer/{customer_id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn products_filter_by_group_and_search() {
    let app = TestApp::new();
    for name in ["Spices", "Grains"] {
        request_json(&app.router, json_request(Method::POST, "/api/ProductGroups", json!({ "name": name }))).await;
    }
    let products = [
        json!({ "sku": "SP-1", "name": "Pepper", "group": "Spices", "uom": "KG", "priceMin": "10.00", "priceMax": 12.5 }),
        json!({ "sku": "SP-2", "name": "Cumin", "group": "spices", "uom": "KG" }),
        json!({ "sku": "GR-1", "name": "Basmati", "group": "Grains", "uom": "KG" }),
    ];
    for p in products {
        let (status, body) = request_json(&app.router, json_request(Method::POST, "/api/Products", p)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    let (status, body) = request_json(
        &app.router,
        json_request(Method::POST, "/api/Products", json!({ "sku": "X", "name": "X", "group": "Dairy", "uom": "L" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["group"].is_array());

    let (_, spices) = request_json(&app.router, get("/api/Products?group=SPICES")).await;
    let names: Vec<&str> = spices["data"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Cumin", "Pepper"]);

    let (_, search) = request_json(&app.router, get("/api/Products?searchTerm=gr-")).await;
    assert_eq!(search["meta"]["count"], 1);
    assert_eq!(search["data"][0]["name"], "Basmati");
}

#[tokio::test]
async fn health_ready_version() {
    let app = TestApp::new();
    let (status, body) = request_json(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = request_json(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "ok");
    let (_, body) = request_json(&app.router, get("/version")).await;
    assert_eq!(body["name"], "distributor-api");
}

#[tokio::test]
async fn malformed_row_version_is_rejected() {
    let app = TestApp::new();
    let order = create_sales_order(&app, Form::default().text("salesItemsJson", &items_json(&[("A", "1")]))).await;
    let id = order["id"].as_str().unwrap().to_string();
    let (status, _) = request_json(
        &app.router,
        Form::default()
            .text("rowVersion", "1")
            .text("salesRemarks", "first writer")
            .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for token in ["1.0", " v1", "AAAAAAAAB9E="] {
        let (status, body) = request_json(
            &app.router,
            Form::default()
                .text("rowVersion", token)
                .text("salesRemarks", "second writer")
                .request(Method::PUT, &format!("/api/SalesOrders/{id}")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "token {token:?}: {body}");
        assert_eq!(body["error"]["code"], "bad_request");
    }
    let (_, fetched) = request_json(&app.router, get(&format!("/api/SalesOrders/{id}"))).await;
    assert_eq!(fetched["data"]["salesRemarks"], "first writer");
    assert_eq!(fetched["data"]["rowVersion"], 2);
}

#[tokio::test]
async fn amounts_beyond_column_precision_are_validation_errors() {
    let app = TestApp::new();
    let (status, body) = request_json(
        &app.router,
        Form::default()
            .text("salesItemsJson", &items_json(&[("A", "100000000000000000")]))
            .request(Method::POST, "/api/SalesOrders"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["details"]["salesItemsJson[0].total"].is_array());

    let (status, body) = request_json(
        &app.router,
        json_request(
            Method::POST,
            "/api/Customer",
            json!({ "code": "C1", "name": "Acme", "balance": "12345678901234567" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["balance"].is_array());

    let (status, _) = request_json(
        &app.router,
        json_request(
            Method::POST,
            "/api/Customer",
            json!({ "code": "C1", "name": "Acme", "balance": "9999999999999999.99" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_unique_gap_free_numbers() {
    let app = TestApp::new();
    let mut tasks = Vec::new();
    for i in 0..20 {
        let router = app.router.clone();
        tasks.push(tokio::spawn(async move {
            let request = Form::default()
                .text("customerName", &format!("Customer {i}"))
                .text("salesItemsJson", &items_json(&[("A", "1")]))
                .request(Method::POST, "/api/SalesOrders");
            request_json(&router, request).await
        }));
    }
    let mut numbers = Vec::new();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "{body}");
        numbers.push(body["data"]["salesOrderNo"].as_str().unwrap().to_string());
    }
    numbers.sort();
    let expected: Vec<String> = (1_000_001..=1_000_020).map(|n| format!("SO-{n}")).collect();
    assert_eq!(numbers, expected);
}
