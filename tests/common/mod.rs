#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cafe_platform::{
    config::{AppConfig, GrpcConfig},
    db::{self, DbPool},
    entities::{cafe, menu_item},
    errors::ServiceError,
    grpc::GrpcRouter,
    services::{
        cafes::{CafeInput, CafeService},
        inventory::{InventoryService, NewInventoryRecord},
        menu::{MenuItemInput, MenuService},
        orders::StockLedger,
    },
};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

pub const LOW_STOCK_THRESHOLD: i32 = 20;

/// Test configuration pointing at an in-memory SQLite database.
///
/// One connection only: every pooled connection to `sqlite::memory:` would
/// otherwise see its own empty database.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_connect_retries = 1;
    cfg.db_connect_retry_delay_secs = 0;
    cfg.low_stock_threshold = LOW_STOCK_THRESHOLD;
    cfg
}

/// A fresh, migrated in-memory database.
pub async fn memory_pool() -> Arc<DbPool> {
    let pool = db::establish_connection_from_app_config(&test_config())
        .await
        .expect("failed to open in-memory database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");
    Arc::new(pool)
}

pub async fn seed_cafe(pool: &Arc<DbPool>, name: &str, access_code: &str) -> cafe::Model {
    CafeService::new(pool.clone())
        .create_cafe(CafeInput {
            name: name.to_string(),
            location: format!("{} street", name),
            access_code: access_code.to_string(),
        })
        .await
        .expect("seed cafe")
}

pub async fn seed_menu_item(
    pool: &Arc<DbPool>,
    name: &str,
    category: &str,
    price: Decimal,
) -> menu_item::Model {
    MenuService::new(pool.clone())
        .add_menu_item(MenuItemInput {
            name: name.to_string(),
            category: category.to_string(),
            price,
        })
        .await
        .expect("seed menu item")
}

pub async fn seed_stock(pool: &Arc<DbPool>, item_id: i32, cafe_id: i32, stock: i32) {
    InventoryService::new(pool.clone(), LOW_STOCK_THRESHOLD)
        .add_inventory_record(NewInventoryRecord {
            item_id,
            cafe_id,
            stock,
            restock_date: None,
        })
        .await
        .expect("seed inventory record");
}

pub async fn stock_of(pool: &Arc<DbPool>, item_id: i32, cafe_id: i32) -> Option<i32> {
    InventoryService::new(pool.clone(), LOW_STOCK_THRESHOLD)
        .get_stock(item_id, cafe_id)
        .await
        .expect("read stock")
        .map(|record| record.stock)
}

/// In-memory [`StockLedger`] for order tests that do not need a database behind stock.
#[derive(Default)]
pub struct MockLedger {
    stock: Mutex<HashMap<(i32, i32), i32>>,
    unavailable: bool,
}

impl MockLedger {
    pub fn with_stock(entries: &[((i32, i32), i32)]) -> Self {
        Self {
            stock: Mutex::new(entries.iter().copied().collect()),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            stock: Mutex::default(),
            unavailable: true,
        }
    }

    pub fn stock(&self, item_id: i32, cafe_id: i32) -> i32 {
        self.stock
            .lock()
            .unwrap()
            .get(&(item_id, cafe_id))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StockLedger for MockLedger {
    async fn decrement_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        if self.unavailable {
            return Err(ServiceError::ServiceUnavailable(
                "inventory service offline".to_string(),
            ));
        }
        let mut stock = self.stock.lock().unwrap();
        match stock.get_mut(&(item_id, cafe_id)) {
            Some(on_hand) if *on_hand >= quantity => {
                *on_hand -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Serves `router` on an ephemeral port and returns its `http://` URL.
pub async fn spawn_grpc(router: GrpcRouter) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("gRPC test server failed");
    });
    format!("http://{}", addr)
}

/// Client settings with short timeouts, for tests against local servers.
pub fn grpc_test_config() -> GrpcConfig {
    GrpcConfig {
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        ..GrpcConfig::default()
    }
}
