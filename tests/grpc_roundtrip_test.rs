mod common;

use assert_matches::assert_matches;
use cafe_platform::{
    errors::ServiceError,
    grpc::{self, client::lazy_channel, client::InventoryLedgerClient},
    proto::{
        cafe_service_client::CafeServiceClient,
        directory::CreateCafeRequest,
        inventory::{GetStockRequest, RestockItemRequest, UpdateInventoryRequest},
        inventory_service_client::InventoryServiceClient,
        order::{CreateOrderRequest, GetOrdersRequest, OrderItem},
        order_service_client::OrderServiceClient,
    },
    services::{cafes::CafeService, inventory::InventoryService, orders::OrderService},
};
use common::{
    grpc_test_config, memory_pool, seed_cafe, seed_menu_item, seed_stock, spawn_grpc,
    LOW_STOCK_THRESHOLD,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tonic::Code;

struct Stack {
    inventory: InventoryServiceClient<tonic::transport::Channel>,
    orders: OrderServiceClient<tonic::transport::Channel>,
    cafe_id: i32,
    item_id: i32,
}

/// Inventory and order services on their own ports and databases, wired the
/// way the deployed services are.
async fn stack(stock: i32) -> Stack {
    let cfg = grpc_test_config();

    let inventory_db = memory_pool().await;
    let cafe = seed_cafe(&inventory_db, "Pier", "PR001").await;
    let item = seed_menu_item(&inventory_db, "Flat White", "Coffee", dec!(4.25)).await;
    seed_stock(&inventory_db, item.item_id, cafe.cafe_id, stock).await;

    let inventory_url = spawn_grpc(grpc::inventory_router(
        &cfg,
        InventoryService::new(inventory_db, LOW_STOCK_THRESHOLD),
    ))
    .await;

    let ledger = InventoryLedgerClient::new(lazy_channel(&inventory_url, &cfg).unwrap());
    let order_url = spawn_grpc(grpc::order_router(
        &cfg,
        OrderService::new(memory_pool().await, Arc::new(ledger)),
    ))
    .await;

    Stack {
        inventory: InventoryServiceClient::new(lazy_channel(&inventory_url, &cfg).unwrap()),
        orders: OrderServiceClient::new(lazy_channel(&order_url, &cfg).unwrap()),
        cafe_id: cafe.cafe_id,
        item_id: item.item_id,
    }
}

fn order_of(cafe_id: i32, item_id: i32, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        cafe_id,
        items: vec![OrderItem {
            item_id,
            quantity,
            price: 4.25,
        }],
    }
}

#[tokio::test]
async fn order_service_decrements_stock_over_grpc() {
    let mut s = stack(5).await;

    let created = s
        .orders
        .create_order(order_of(s.cafe_id, s.item_id, 3))
        .await
        .expect("order accepted")
        .into_inner();
    assert!(created.success);
    assert!(created.order_id > 0);
    assert_eq!(created.total_price, 12.75);

    let stock = s
        .inventory
        .get_stock(GetStockRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(stock.stock_quantity, 2);
    assert!(stock.is_low_stock);

    let listed = s
        .orders
        .get_orders_by_cafe(GetOrdersRequest { cafe_id: s.cafe_id })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listed.orders.len(), 1);
    assert_eq!(listed.orders[0].items[0].quantity, 3);
}

#[tokio::test]
async fn insufficient_stock_crosses_the_wire_with_its_item() {
    let mut s = stack(5).await;
    s.orders
        .create_order(order_of(s.cafe_id, s.item_id, 3))
        .await
        .unwrap();

    let status = s
        .orders
        .create_order(order_of(s.cafe_id, s.item_id, 3))
        .await
        .expect_err("second order must be rejected");
    assert_eq!(status.code(), Code::FailedPrecondition);

    let item_id = s.item_id;
    assert_matches!(
        ServiceError::from(status),
        ServiceError::InsufficientStock { item_id: reported } if reported == item_id
    );

    // Stock untouched by the rejected order.
    let stock = s
        .inventory
        .get_stock(GetStockRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(stock.stock_quantity, 2);
}

#[tokio::test]
async fn sub_cent_prices_are_invalid_arguments() {
    let mut s = stack(5).await;
    let mut request = order_of(s.cafe_id, s.item_id, 1);
    request.items[0].price = 4.255;

    let status = s
        .orders
        .create_order(request)
        .await
        .expect_err("price finer than a cent");
    assert_eq!(status.code(), Code::InvalidArgument);

    let stock = s
        .inventory
        .get_stock(GetStockRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(stock.stock_quantity, 5);
}

#[tokio::test]
async fn inventory_rpcs_report_outcomes_in_the_response() {
    let mut s = stack(1).await;

    let short = s
        .inventory
        .update_inventory_after_order(UpdateInventoryRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id,
            quantity_ordered: 2,
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!short.success);

    let missing = s
        .inventory
        .restock_item(RestockItemRequest {
            item_id: s.item_id + 1,
            cafe_id: s.cafe_id,
            quantity_added: 5,
            restock_date: "2024-06-01".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!missing.success);

    let bad_date = s
        .inventory
        .restock_item(RestockItemRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id,
            quantity_added: 5,
            restock_date: "June".to_string(),
        })
        .await
        .expect_err("malformed date");
    assert_eq!(bad_date.code(), Code::InvalidArgument);

    let unknown = s
        .inventory
        .get_stock(GetStockRequest {
            item_id: s.item_id,
            cafe_id: s.cafe_id + 1,
        })
        .await
        .expect_err("no record at that cafe");
    assert_eq!(unknown.code(), Code::NotFound);
}

#[tokio::test]
async fn duplicate_access_code_is_tagged_on_already_exists() {
    let cfg = grpc_test_config();
    let url = spawn_grpc(grpc::cafe_router(&cfg, CafeService::new(memory_pool().await))).await;
    let mut client = CafeServiceClient::new(lazy_channel(&url, &cfg).unwrap());

    let request = || CreateCafeRequest {
        name: "Dockside".to_string(),
        location: "Quay 4".to_string(),
        access_code: "DK456".to_string(),
    };

    let created = client.create_cafe(request()).await.unwrap().into_inner();
    assert_eq!(created.access_code, "DK456");

    let status = client
        .create_cafe(request())
        .await
        .expect_err("duplicate code");
    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(
        status
            .metadata()
            .get("x-error-kind")
            .and_then(|v| v.to_str().ok()),
        Some("duplicate-access-code")
    );
    assert_matches!(
        ServiceError::from(status),
        ServiceError::DuplicateAccessCode(_)
    );
}

#[tokio::test]
async fn order_service_without_inventory_is_unavailable() {
    let cfg = grpc_test_config();
    let ledger = InventoryLedgerClient::new(lazy_channel("http://127.0.0.1:1", &cfg).unwrap());
    let orders_db = memory_pool().await;
    let url = spawn_grpc(grpc::order_router(
        &cfg,
        OrderService::new(orders_db, Arc::new(ledger)),
    ))
    .await;
    let mut client = OrderServiceClient::new(lazy_channel(&url, &cfg).unwrap());

    let status = client
        .create_order(order_of(1, 1, 1))
        .await
        .expect_err("inventory is down");
    assert_eq!(status.code(), Code::Unavailable);
}
