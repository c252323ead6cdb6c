//! Cafe platform library
//!
//! gRPC services for the cafe back office (login, admin, menu, cafe
//! directory, inventory, orders, analytics) and the REST gateway in front of
//! them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod grpc;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod proto;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::grpc::client::GatewayClients;

/// Shared state of the gateway: one lazily connected client per service.
#[derive(Clone)]
pub struct AppState {
    pub clients: GatewayClients,
    pub config: Arc<config::AppConfig>,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every gateway route, before state and middleware are attached.
pub fn gateway_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/orders/create", post(handlers::orders::create_order))
        .route("/orders/:cafe_id", get(handlers::orders::get_orders_by_cafe));

    let inventory = Router::new()
        .route(
            "/api/inventory/all",
            get(handlers::inventory::get_all_inventory),
        )
        .route(
            "/api/inventory/restock",
            post(handlers::inventory::restock_item),
        )
        .route(
            "/api/inventory",
            post(handlers::inventory::add_inventory_record),
        );

    let menu = Router::new()
        .route("/menu/items", get(handlers::menu::get_menu_items))
        .route("/api/menu/items", get(handlers::menu::get_menu_items))
        .route("/api/menu/add", post(handlers::menu::add_menu_item))
        .route("/api/menu/update", put(handlers::menu::update_menu_item))
        .route("/api/menu/delete", delete(handlers::menu::delete_menu_item));

    let cafes = Router::new()
        .route(
            "/api/cafes",
            get(handlers::cafes::list_cafes).post(handlers::cafes::create_cafe),
        )
        .route("/api/cafes/verify", post(handlers::cafes::verify_cafe_code))
        .route(
            "/api/cafes/:id",
            put(handlers::cafes::update_cafe).delete(handlers::cafes::delete_cafe),
        );

    let accounts = Router::new()
        .route("/api/login", post(handlers::login::login))
        .route("/api/login/cafes", get(handlers::login::list_login_cafes))
        .route("/adminlogin", post(handlers::admin::admin_login))
        .route("/api/admin/update", post(handlers::admin::update_admin_info));

    let analytics = Router::new()
        .route("/analytics", get(handlers::analytics::get_card_metrics))
        .route("/analytics/overview", get(handlers::analytics::get_overview));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .merge(orders)
        .merge(inventory)
        .merge(menu)
        .merge(cafes)
        .merge(accounts)
        .merge(analytics)
}

/// The gateway application: routes, request ids and HTTP tracing.
pub fn app(state: AppState) -> Router {
    gateway_routes()
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "cafe-gateway",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let grpc = &state.config.grpc;
    // Upstream channels are lazy, so this only reports where they point.
    let health_data = json!({
        "status": "healthy",
        "upstreams": {
            "login": grpc.login_url,
            "order": grpc.order_url,
            "analytics": grpc.analytics_url,
            "cafe": grpc.cafe_url,
            "menu": grpc.menu_url,
            "inventory": grpc.inventory_url,
            "admin_login": grpc.admin_login_url,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            ::tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                ::tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    ::tracing::info!("Shutdown signal received");
}
