use axum::Json;
use utoipa::OpenApi;

use crate::handlers::{admin, analytics, cafes, inventory, login, menu, orders};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cafe Platform Gateway",
        version = "0.1.0",
        description = r#"
# Cafe Platform REST Gateway

JSON front door for the cafe back-office services. Every route forwards to one
gRPC service:

- **Orders**: place orders (stock is checked and decremented per line) and list a cafe's orders
- **Inventory**: stock per (menu item, cafe), restocking and new records
- **Menu**: catalogue search and maintenance
- **Cafes**: cafe directory and access codes
- **Login / Admin**: cafe staff and administrator credential checks
- **Analytics**: monthly dashboard figures

## Errors

Failures share one body:

```json
{
  "error": "Conflict",
  "message": "Insufficient stock for item 7",
  "details": "item_id=7",
  "request_id": "4b1f...",
  "timestamp": "2025-10-09T10:30:00Z"
}
```

Identifier fields accept numbers or numeric strings. Every response carries
an `x-request-id` header.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement and history"),
        (name = "Inventory", description = "Stock levels per cafe"),
        (name = "Menu", description = "Menu catalogue"),
        (name = "Cafes", description = "Cafe directory"),
        (name = "Login", description = "Cafe staff login"),
        (name = "Admin", description = "Administrator accounts"),
        (name = "Analytics", description = "Sales dashboards")
    ),
    paths(
        orders::create_order,
        orders::get_orders_by_cafe,
        inventory::get_all_inventory,
        inventory::restock_item,
        inventory::add_inventory_record,
        menu::get_menu_items,
        menu::add_menu_item,
        menu::update_menu_item,
        menu::delete_menu_item,
        cafes::list_cafes,
        cafes::create_cafe,
        cafes::update_cafe,
        cafes::delete_cafe,
        cafes::verify_cafe_code,
        login::login,
        login::list_login_cafes,
        admin::admin_login,
        admin::update_admin_info,
        analytics::get_card_metrics,
        analytics::get_overview,
    ),
    components(
        schemas(
            orders::CreateOrderRequest,
            orders::OrderLineRequest,
            orders::CreateOrderResponse,
            orders::OrderListResponse,
            orders::OrderView,
            orders::OrderLineView,
            inventory::InventoryItemView,
            inventory::InventoryListResponse,
            inventory::RestockRequest,
            inventory::RestockResponse,
            inventory::AddInventoryRequest,
            menu::MenuItemView,
            menu::MenuListResponse,
            menu::MenuItemRequest,
            menu::UpdateMenuItemBody,
            menu::DeleteMenuItemBody,
            menu::DeleteMenuItemResponse,
            cafes::CafeView,
            cafes::CafeListResponse,
            cafes::CafeRequest,
            cafes::VerifyCodeRequest,
            cafes::DeleteCafeResponse,
            login::CafeLoginRequest,
            login::CafeLoginResponse,
            login::CafeSummaryView,
            login::CafeSummaryListResponse,
            admin::AdminLoginRequest,
            admin::AdminLoginResponse,
            admin::UpdateAdminRequest,
            admin::UpdateAdminResponse,
            analytics::CardMetricsResponse,
            analytics::OverviewResponse,
            analytics::CafeSalesView,
            analytics::DailySalesView,
            analytics::CafeDailySeries,
            analytics::CafeProductsView,
            analytics::ProductQuantityView,
            analytics::CafeProductView,
            analytics::CategoryTotalView,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_gateway_route() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        for path in [
            "/orders/create",
            "/orders/{cafe_id}",
            "/api/inventory/all",
            "/api/inventory/restock",
            "/api/menu/delete",
            "/api/cafes/{id}",
            "/api/login",
            "/adminlogin",
            "/analytics/overview",
        ] {
            assert!(json.contains(path), "missing {}", path);
        }
        assert!(json.contains("Cafe Platform Gateway"));
    }
}
