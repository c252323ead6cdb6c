mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cafe_platform::{
    config::{AppConfig, GrpcConfig},
    grpc::{self, client::GatewayClients, client::InventoryLedgerClient, client::lazy_channel},
    services::{
        admin_login::AdminLoginService, analytics::AnalyticsService, cafes::CafeService,
        inventory::InventoryService, login::LoginService, menu::MenuService,
        orders::OrderService,
    },
    AppState,
};
use common::{
    grpc_test_config, memory_pool, seed_cafe, seed_menu_item, seed_stock, spawn_grpc,
    LOW_STOCK_THRESHOLD,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestGateway {
    app: Router,
    cafe_id: i32,
    latte: i32,
}

impl TestGateway {
    /// Every backend on an ephemeral port behind a real gateway router.
    ///
    /// Orders and the catalogue share one database; inventory has its own,
    /// seeded with the same cafe and item so ids line up.
    async fn spawn(latte_stock: i32) -> Self {
        let cfg = grpc_test_config();
        let main_db = memory_pool().await;
        let inventory_db = memory_pool().await;

        let mut ids = (0, 0);
        for pool in [&main_db, &inventory_db] {
            let cafe = seed_cafe(pool, "Harbour", "HB001").await;
            let latte = seed_menu_item(pool, "Latte", "Coffee", dec!(4.5)).await;
            ids = (cafe.cafe_id, latte.item_id);
        }
        let (cafe_id, latte) = ids;
        seed_stock(&inventory_db, latte, cafe_id, latte_stock).await;

        let inventory_url = spawn_grpc(grpc::inventory_router(
            &cfg,
            InventoryService::new(inventory_db, LOW_STOCK_THRESHOLD),
        ))
        .await;
        let ledger = InventoryLedgerClient::new(lazy_channel(&inventory_url, &cfg).unwrap());
        let order_url = spawn_grpc(grpc::order_router(
            &cfg,
            OrderService::new(main_db.clone(), Arc::new(ledger)),
        ))
        .await;
        let analytics_url = spawn_grpc(grpc::analytics_router(
            &cfg,
            AnalyticsService::new(main_db.clone()),
        ))
        .await;
        let cafe_url =
            spawn_grpc(grpc::cafe_router(&cfg, CafeService::new(main_db.clone()))).await;
        let menu_url =
            spawn_grpc(grpc::menu_router(&cfg, MenuService::new(main_db.clone()))).await;
        let login_url =
            spawn_grpc(grpc::login_router(&cfg, LoginService::new(main_db.clone()))).await;
        let admin_login_url = spawn_grpc(grpc::admin_login_router(
            &cfg,
            AdminLoginService::new(main_db.clone()),
        ))
        .await;

        let grpc = GrpcConfig {
            login_url,
            order_url,
            analytics_url,
            cafe_url,
            menu_url,
            inventory_url,
            admin_login_url,
            ..cfg
        };

        Self {
            app: gateway(grpc),
            cafe_id,
            latte,
        }
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, body).await
    }
}

fn gateway(grpc: GrpcConfig) -> Router {
    let clients = GatewayClients::connect_lazy(&grpc).expect("clients");
    let mut config = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    config.grpc = grpc;
    cafe_platform::app(AppState {
        clients,
        config: Arc::new(config),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn order_is_created_then_rejected_when_stock_runs_out() {
    let gw = TestGateway::spawn(5).await;
    let order = json!({
        "cafe_id": gw.cafe_id,
        "items": [{ "item_id": gw.latte, "quantity": 3, "price": 4.5 }]
    });

    let (status, body) = gw
        .request(Method::POST, "/orders/create", Some(order.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["total_price"], 13.5);
    assert!(body["order_id"].as_i64().unwrap() > 0);

    let (status, body) = gw.request(Method::POST, "/orders/create", Some(order)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        format!("Insufficient stock for item {}", gw.latte)
    );
    assert_eq!(body["details"], format!("item_id={}", gw.latte));

    let (status, body) = gw.request(Method::GET, "/api/inventory/all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["stock_quantity"], 2);
    assert_eq!(body["items"][0]["is_low_stock"], true);
}

#[tokio::test]
async fn string_ids_are_accepted_and_orders_listed() {
    let gw = TestGateway::spawn(10).await;
    let order = json!({
        "cafe_id": gw.cafe_id.to_string(),
        "items": [{ "item_id": gw.latte.to_string(), "quantity": "2", "price": 4.5 }]
    });

    let (status, created) = gw.request(Method::POST, "/orders/create", Some(order)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = gw
        .request(Method::GET, &format!("/orders/{}", gw.cafe_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], created["order_id"]);
    assert_eq!(orders[0]["items"][0]["quantity"], 2);

    let (status, body) = gw.request(Method::GET, "/orders/999", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["orders"].as_array().unwrap().is_empty());

    let (status, _) = gw.request(Method::GET, "/orders/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_or_invalid_payloads_are_bad_requests() {
    let gw = TestGateway::spawn(10).await;

    let response = gw
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/orders/create")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = gw
        .request(
            Method::POST,
            "/orders/create",
            Some(json!({ "cafe_id": gw.cafe_id, "items": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = gw
        .request(
            Method::POST,
            "/orders/create",
            Some(json!({
                "cafe_id": gw.cafe_id,
                "items": [{ "item_id": gw.latte, "quantity": 0, "price": 4.5 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = gw
        .request(Method::GET, "/analytics?month=13&year=2024", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restock_of_unknown_pair_is_not_found() {
    let gw = TestGateway::spawn(10).await;

    let (status, body) = gw
        .request(
            Method::POST,
            "/api/inventory/restock",
            Some(json!({
                "item_id": gw.latte,
                "cafe_id": gw.cafe_id,
                "quantity_added": 15,
                "restock_date": "2024-06-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = gw
        .request(
            Method::POST,
            "/api/inventory/restock",
            Some(json!({
                "item_id": gw.latte + 50,
                "cafe_id": gw.cafe_id,
                "quantity_added": 15,
                "restock_date": "2024-06-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = gw.request(Method::GET, "/api/inventory/all", None).await;
    assert_eq!(body["items"][0]["stock_quantity"], 25);
    assert_eq!(body["items"][0]["restock_date"], "2024-06-01");
}

#[tokio::test]
async fn cafe_directory_and_logins_map_errors_to_statuses() {
    let gw = TestGateway::spawn(10).await;

    let (status, _) = gw
        .request(
            Method::POST,
            "/api/cafes",
            Some(json!({ "name": "Dockside", "location": "Quay 4", "access_code": "DK456" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = gw
        .request(
            Method::POST,
            "/api/cafes",
            Some(json!({ "name": "Dockside 2", "access_code": "DK456" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = gw.request(Method::GET, "/api/cafes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cafes"].as_array().unwrap().len(), 2);

    let (status, _) = gw
        .request(Method::DELETE, "/api/cafes/4040", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = gw
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "cafe_id": gw.cafe_id.to_string(), "access_code": "HB001" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cafe_name"], "Harbour");

    let (status, body) = gw
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "cafe_id": gw.cafe_id, "access_code": "DK456" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, _) = gw
        .request(
            Method::POST,
            "/adminlogin",
            Some(json!({ "username": "nobody", "password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn menu_is_searchable_on_both_paths() {
    let gw = TestGateway::spawn(10).await;

    let (status, _) = gw
        .request(
            Method::POST,
            "/api/menu/add",
            Some(json!({ "name": "Iced Latte", "category": "Coffee", "price": 4.75 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for path in ["/menu/items?search=latte", "/api/menu/items?search=LATTE"] {
        let (status, body) = gw.request(Method::GET, path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 2, "{}", path);
    }

    let (status, _) = gw
        .request(Method::DELETE, "/api/menu/delete", Some(json!({ "id": 9999 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_overview_includes_derived_views() {
    let gw = TestGateway::spawn(10).await;
    let (status, _) = gw
        .request(
            Method::POST,
            "/orders/create",
            Some(json!({
                "cafe_id": gw.cafe_id,
                "items": [{ "item_id": gw.latte, "quantity": 2, "price": 4.5 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // No period given: the current month, which holds the order just placed.
    let (status, body) = gw.request(Method::GET, "/analytics/overview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cafe_comparison"][0]["cafe"], "Harbour");
    assert_eq!(body["cafe_comparison"][0]["total_sales"], 9.0);
    assert_eq!(body["top_products_per_cafe"][0]["product"], "Latte");
    assert_eq!(body["least_products_per_cafe"][0]["product"], "Latte");
    assert_eq!(body["sales_per_cafe_daily"][0]["cafe"], "Harbour");
    assert_eq!(body["category_distribution"][0]["category"], "Coffee");

    let (status, body) = gw.request(Method::GET, "/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["top_product"], "Latte");
    assert_eq!(body["total_sales"], 9.0);
}

#[tokio::test]
async fn request_ids_are_echoed_and_status_reports_environment() {
    let gw = TestGateway::spawn(1).await;

    let response = gw
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/status")
                .header("x-request-id", "trace-me-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me-42"
    );
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["data"]["environment"], "test");
    assert_eq!(body["meta"]["request_id"], "trace-me-42");

    let (status, body) = gw.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/orders/create"].is_object());
}

#[tokio::test]
async fn unreachable_upstreams_are_service_unavailable() {
    let dead = "http://127.0.0.1:1".to_string();
    let app = gateway(GrpcConfig {
        login_url: dead.clone(),
        order_url: dead.clone(),
        analytics_url: dead.clone(),
        cafe_url: dead.clone(),
        menu_url: dead.clone(),
        inventory_url: dead.clone(),
        admin_login_url: dead,
        ..grpc_test_config()
    });

    let (status, _) = send(&app, Method::GET, "/api/menu/items", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(
        &app,
        Method::POST,
        "/orders/create",
        Some(json!({ "cafe_id": 1, "items": [{ "item_id": 1, "quantity": 1, "price": 1.0 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // The gateway itself stays up.
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
