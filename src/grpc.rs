pub mod client;

use crate::{
    config::GrpcConfig,
    errors::{grpc::map_service_error, ServiceError},
    proto::{
        admin::{
            self as admin_pb,
            admin_login_service_server::{AdminLoginService as AdminLoginRpc, AdminLoginServiceServer},
        },
        analytics::{
            self as analytics_pb,
            analytics_service_server::{AnalyticsService as AnalyticsRpc, AnalyticsServiceServer},
        },
        directory::{
            self as directory_pb,
            cafe_service_server::{CafeService as CafeRpc, CafeServiceServer},
        },
        inventory::{
            self as inventory_pb,
            inventory_service_server::{InventoryService as InventoryRpc, InventoryServiceServer},
        },
        login::{
            self as login_pb,
            login_service_server::{LoginService as LoginRpc, LoginServiceServer},
        },
        menu::{
            self as menu_pb,
            menu_service_server::{MenuService as MenuRpc, MenuServiceServer},
        },
        order::{
            self as order_pb,
            order_service_server::{OrderService as OrderRpc, OrderServiceServer},
        },
    },
    services::{
        admin_login::AdminLoginService,
        analytics::{AnalyticsService, Period},
        cafes::{CafeInput, CafeService},
        inventory::{InventoryService, InventoryView, NewInventoryRecord, RESTOCK_DATE_FORMAT},
        login::LoginService,
        menu::{MenuItemInput, MenuService},
        orders::{NewOrder, NewOrderLine, OrderService},
    },
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use tonic::{
    transport::{server::Router, Server},
    Request, Response, Status,
};
use tower::layer::util::{Identity, Stack};
use tower_http::{
    classify::{GrpcErrorsAsFailures, SharedClassifier},
    trace::TraceLayer,
};
use tracing::info;

/// Converts a wire amount into money. Amounts finer than a cent are rejected;
/// binary float noise below `1e-9` is not counted as a fraction of a cent.
pub(crate) fn decimal_from_wire(value: f64, field: &str) -> Result<Decimal, ServiceError> {
    if !value.is_finite() {
        return Err(ServiceError::ValidationError(format!(
            "{} must be a finite number",
            field
        )));
    }
    let amount = Decimal::from_f64(value)
        .ok_or_else(|| ServiceError::ValidationError(format!("{} is out of range", field)))?;
    let cents = amount.round_dp(2);
    if (amount - cents).abs() > Decimal::new(1, 9) {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot have more than two decimal places",
            field
        )));
    }
    Ok(cents)
}

pub(crate) fn decimal_to_wire(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn inventory_item(view: InventoryView) -> inventory_pb::InventoryItem {
    inventory_pb::InventoryItem {
        item_id: view.item_id,
        cafe_id: view.cafe_id,
        item_name: view.item_name,
        cafe_name: view.cafe_name,
        stock_quantity: view.stock_quantity,
        restock_date: view
            .restock_date
            .map(|d| d.format(RESTOCK_DATE_FORMAT).to_string())
            .unwrap_or_default(),
        is_low_stock: view.is_low_stock,
    }
}

pub struct InventoryGrpcService {
    pub svc: InventoryService,
}

impl InventoryGrpcService {
    fn record_item(&self, record: crate::entities::inventory::Model) -> inventory_pb::InventoryItem {
        inventory_item(InventoryView {
            item_id: record.item_id,
            cafe_id: record.cafe_id,
            item_name: String::new(),
            cafe_name: String::new(),
            stock_quantity: record.stock,
            restock_date: record.restock_date,
            is_low_stock: self.svc.is_low_stock(record.stock),
        })
    }
}

#[tonic::async_trait]
impl InventoryRpc for InventoryGrpcService {
    async fn get_all_inventory(
        &self,
        _request: Request<inventory_pb::GetAllInventoryRequest>,
    ) -> Result<Response<inventory_pb::InventoryList>, Status> {
        let items = self
            .svc
            .get_all_inventory()
            .await
            .into_iter()
            .map(inventory_item)
            .collect();
        Ok(Response::new(inventory_pb::InventoryList { items }))
    }

    async fn update_inventory_after_order(
        &self,
        request: Request<inventory_pb::UpdateInventoryRequest>,
    ) -> Result<Response<inventory_pb::UpdateInventoryResponse>, Status> {
        let req = request.into_inner();
        let success = map_service_error(
            self.svc
                .decrement_stock(req.item_id, req.cafe_id, req.quantity_ordered)
                .await,
        )?;
        let message = if success {
            "Inventory updated".to_string()
        } else {
            format!("Insufficient stock for item {}", req.item_id)
        };
        Ok(Response::new(inventory_pb::UpdateInventoryResponse { success, message }))
    }

    async fn restock_item(
        &self,
        request: Request<inventory_pb::RestockItemRequest>,
    ) -> Result<Response<inventory_pb::RestockItemResponse>, Status> {
        let req = request.into_inner();
        let success = map_service_error(
            self.svc
                .restock(req.item_id, req.cafe_id, req.quantity_added, &req.restock_date)
                .await,
        )?;
        let message = if success {
            "Item restocked".to_string()
        } else {
            format!(
                "No inventory record for item {} at cafe {}",
                req.item_id, req.cafe_id
            )
        };
        Ok(Response::new(inventory_pb::RestockItemResponse { success, message }))
    }

    async fn add_inventory_record(
        &self,
        request: Request<inventory_pb::AddInventoryRecordRequest>,
    ) -> Result<Response<inventory_pb::InventoryItem>, Status> {
        let req = request.into_inner();
        let record = map_service_error(
            self.svc
                .add_inventory_record(NewInventoryRecord {
                    item_id: req.item_id,
                    cafe_id: req.cafe_id,
                    stock: req.stock,
                    restock_date: Some(req.restock_date),
                })
                .await,
        )?;
        Ok(Response::new(self.record_item(record)))
    }

    async fn get_stock(
        &self,
        request: Request<inventory_pb::GetStockRequest>,
    ) -> Result<Response<inventory_pb::InventoryItem>, Status> {
        let req = request.into_inner();
        let record = map_service_error(self.svc.get_stock(req.item_id, req.cafe_id).await)?
            .ok_or_else(|| {
                Status::not_found(format!(
                    "No inventory record for item {} at cafe {}",
                    req.item_id, req.cafe_id
                ))
            })?;
        Ok(Response::new(self.record_item(record)))
    }
}

pub struct OrderGrpcService {
    pub svc: OrderService,
}

#[tonic::async_trait]
impl OrderRpc for OrderGrpcService {
    async fn create_order(
        &self,
        request: Request<order_pb::CreateOrderRequest>,
    ) -> Result<Response<order_pb::CreateOrderResponse>, Status> {
        let req = request.into_inner();
        let items = map_service_error(
            req.items
                .into_iter()
                .map(|item| {
                    Ok(NewOrderLine {
                        item_id: item.item_id,
                        quantity: item.quantity,
                        price: decimal_from_wire(item.price, "price")?,
                    })
                })
                .collect::<Result<Vec<_>, ServiceError>>(),
        )?;

        let created = map_service_error(
            self.svc
                .create_order(NewOrder {
                    cafe_id: req.cafe_id,
                    items,
                })
                .await,
        )?;

        Ok(Response::new(order_pb::CreateOrderResponse {
            success: true,
            message: "Order created".to_string(),
            order_id: created.order_id,
            total_price: decimal_to_wire(created.total_price),
        }))
    }

    async fn get_orders_by_cafe(
        &self,
        request: Request<order_pb::GetOrdersRequest>,
    ) -> Result<Response<order_pb::OrderList>, Status> {
        let cafe_id = request.into_inner().cafe_id;
        let orders = map_service_error(self.svc.get_orders_by_cafe(cafe_id).await)?
            .into_iter()
            .map(|o| order_pb::Order {
                order_id: o.order.order_id,
                cafe_id: o.order.cafe_id,
                total_price: decimal_to_wire(o.order.total_price),
                created_at: o.order.created_at.to_rfc3339(),
                items: o
                    .items
                    .into_iter()
                    .map(|i| order_pb::OrderItem {
                        item_id: i.item_id,
                        quantity: i.quantity,
                        price: decimal_to_wire(i.price),
                    })
                    .collect(),
            })
            .collect();
        Ok(Response::new(order_pb::OrderList { orders }))
    }
}

fn menu_item(model: crate::entities::menu_item::Model) -> menu_pb::MenuItem {
    menu_pb::MenuItem {
        item_id: model.item_id,
        name: model.name,
        category: model.category,
        price: decimal_to_wire(model.price),
    }
}

pub struct MenuGrpcService {
    pub svc: MenuService,
}

#[tonic::async_trait]
impl MenuRpc for MenuGrpcService {
    async fn add_menu_item(
        &self,
        request: Request<menu_pb::AddMenuItemRequest>,
    ) -> Result<Response<menu_pb::MenuItem>, Status> {
        let req = request.into_inner();
        let price = map_service_error(decimal_from_wire(req.price, "price"))?;
        let item = map_service_error(
            self.svc
                .add_menu_item(MenuItemInput {
                    name: req.name,
                    category: req.category,
                    price,
                })
                .await,
        )?;
        Ok(Response::new(menu_item(item)))
    }

    async fn get_menu_items(
        &self,
        request: Request<menu_pb::GetMenuItemsRequest>,
    ) -> Result<Response<menu_pb::MenuItemList>, Status> {
        let search = request.into_inner().search;
        let items = map_service_error(self.svc.get_menu_items(Some(search.as_str())).await)?
            .into_iter()
            .map(menu_item)
            .collect();
        Ok(Response::new(menu_pb::MenuItemList { items }))
    }

    async fn update_menu_item(
        &self,
        request: Request<menu_pb::UpdateMenuItemRequest>,
    ) -> Result<Response<menu_pb::MenuItem>, Status> {
        let req = request.into_inner();
        let price = map_service_error(decimal_from_wire(req.price, "price"))?;
        let item = map_service_error(
            self.svc
                .update_menu_item(
                    req.item_id,
                    MenuItemInput {
                        name: req.name,
                        category: req.category,
                        price,
                    },
                )
                .await,
        )?;
        Ok(Response::new(menu_item(item)))
    }

    async fn delete_menu_item(
        &self,
        request: Request<menu_pb::DeleteMenuItemRequest>,
    ) -> Result<Response<menu_pb::DeleteMenuItemResponse>, Status> {
        let item_id = request.into_inner().item_id;
        let success = map_service_error(self.svc.delete_menu_item(item_id).await)?;
        let message = if success {
            "Menu item deleted".to_string()
        } else {
            format!("Menu item {} not found", item_id)
        };
        Ok(Response::new(menu_pb::DeleteMenuItemResponse { success, message }))
    }
}

fn cafe_message(model: crate::entities::cafe::Model) -> directory_pb::Cafe {
    directory_pb::Cafe {
        cafe_id: model.cafe_id,
        name: model.name,
        location: model.location,
        access_code: model.access_code,
    }
}

pub struct CafeGrpcService {
    pub svc: CafeService,
}

#[tonic::async_trait]
impl CafeRpc for CafeGrpcService {
    async fn create_cafe(
        &self,
        request: Request<directory_pb::CreateCafeRequest>,
    ) -> Result<Response<directory_pb::Cafe>, Status> {
        let req = request.into_inner();
        let cafe = map_service_error(
            self.svc
                .create_cafe(CafeInput {
                    name: req.name,
                    location: req.location,
                    access_code: req.access_code,
                })
                .await,
        )?;
        Ok(Response::new(cafe_message(cafe)))
    }

    async fn get_all_cafes(
        &self,
        _request: Request<directory_pb::GetAllCafesRequest>,
    ) -> Result<Response<directory_pb::CafeList>, Status> {
        let cafes = map_service_error(self.svc.get_all_cafes().await)?
            .into_iter()
            .map(cafe_message)
            .collect();
        Ok(Response::new(directory_pb::CafeList { cafes }))
    }

    async fn update_cafe(
        &self,
        request: Request<directory_pb::UpdateCafeRequest>,
    ) -> Result<Response<directory_pb::Cafe>, Status> {
        let req = request.into_inner();
        let cafe = map_service_error(
            self.svc
                .update_cafe(
                    req.cafe_id,
                    CafeInput {
                        name: req.name,
                        location: req.location,
                        access_code: req.access_code,
                    },
                )
                .await,
        )?;
        Ok(Response::new(cafe_message(cafe)))
    }

    async fn delete_cafe(
        &self,
        request: Request<directory_pb::DeleteCafeRequest>,
    ) -> Result<Response<directory_pb::DeleteCafeResponse>, Status> {
        let cafe_id = request.into_inner().cafe_id;
        map_service_error(self.svc.delete_cafe(cafe_id).await)?;
        Ok(Response::new(directory_pb::DeleteCafeResponse {
            success: true,
            message: format!("Cafe {} deleted", cafe_id),
        }))
    }

    async fn verify_cafe_code(
        &self,
        request: Request<directory_pb::VerifyCafeCodeRequest>,
    ) -> Result<Response<directory_pb::Cafe>, Status> {
        let code = request.into_inner().access_code;
        let cafe = map_service_error(self.svc.verify_cafe_code(&code).await)?;
        Ok(Response::new(cafe_message(cafe)))
    }
}

pub struct LoginGrpcService {
    pub svc: LoginService,
}

#[tonic::async_trait]
impl LoginRpc for LoginGrpcService {
    async fn authenticate_cafe(
        &self,
        request: Request<login_pb::AuthenticateCafeRequest>,
    ) -> Result<Response<login_pb::AuthenticateCafeResponse>, Status> {
        let req = request.into_inner();
        let cafe =
            map_service_error(self.svc.authenticate_cafe(req.cafe_id, &req.access_code).await)?;
        Ok(Response::new(login_pb::AuthenticateCafeResponse {
            success: true,
            message: "Login successful".to_string(),
            cafe_id: cafe.cafe_id,
            cafe_name: cafe.name,
        }))
    }

    async fn list_cafes(
        &self,
        _request: Request<login_pb::ListCafesRequest>,
    ) -> Result<Response<login_pb::CafeSummaryList>, Status> {
        let cafes = map_service_error(self.svc.list_cafes().await)?
            .into_iter()
            .map(|c| login_pb::CafeSummary {
                cafe_id: c.cafe_id,
                name: c.name,
                location: c.location,
            })
            .collect();
        Ok(Response::new(login_pb::CafeSummaryList { cafes }))
    }
}

pub struct AdminLoginGrpcService {
    pub svc: AdminLoginService,
}

#[tonic::async_trait]
impl AdminLoginRpc for AdminLoginGrpcService {
    async fn login(
        &self,
        request: Request<admin_pb::AdminLoginRequest>,
    ) -> Result<Response<admin_pb::AdminLoginResponse>, Status> {
        let req = request.into_inner();
        let admin = map_service_error(self.svc.login(&req.username, &req.password).await)?;
        Ok(Response::new(admin_pb::AdminLoginResponse {
            success: true,
            message: "Login successful".to_string(),
            admin_id: admin.admin_id,
            username: admin.username,
        }))
    }

    async fn update_admin_info(
        &self,
        request: Request<admin_pb::UpdateAdminInfoRequest>,
    ) -> Result<Response<admin_pb::UpdateAdminInfoResponse>, Status> {
        let req = request.into_inner();
        map_service_error(
            self.svc
                .update_admin_info(req.admin_id, req.username.as_deref(), req.password.as_deref())
                .await,
        )?;
        Ok(Response::new(admin_pb::UpdateAdminInfoResponse {
            success: true,
            message: "Admin info updated".to_string(),
        }))
    }
}

pub struct AnalyticsGrpcService {
    pub svc: AnalyticsService,
}

fn period_from_wire(req: &analytics_pb::PeriodRequest) -> Result<Period, ServiceError> {
    let month = u32::try_from(req.month)
        .map_err(|_| ServiceError::ValidationError(format!("Invalid month {}", req.month)))?;
    Period::new(month, req.year)
}

#[tonic::async_trait]
impl AnalyticsRpc for AnalyticsGrpcService {
    async fn get_card_metrics(
        &self,
        request: Request<analytics_pb::PeriodRequest>,
    ) -> Result<Response<analytics_pb::CardMetrics>, Status> {
        let period = map_service_error(period_from_wire(request.get_ref()))?;
        let metrics = map_service_error(self.svc.get_card_metrics(period).await)?;
        Ok(Response::new(analytics_pb::CardMetrics {
            top_product: metrics.top_product,
            top_cafe: metrics.top_cafe,
            total_sales: decimal_to_wire(metrics.total_sales),
            growth_percent: decimal_to_wire(metrics.growth_percent),
        }))
    }

    async fn get_overview(
        &self,
        request: Request<analytics_pb::PeriodRequest>,
    ) -> Result<Response<analytics_pb::Overview>, Status> {
        let period = map_service_error(period_from_wire(request.get_ref()))?;
        let overview = map_service_error(self.svc.get_overview(period).await)?;

        let products = |items: Vec<crate::services::analytics::ProductQuantity>| {
            items
                .into_iter()
                .map(|p| analytics_pb::ProductQuantity {
                    product: p.product,
                    qty: p.qty,
                })
                .collect::<Vec<_>>()
        };

        Ok(Response::new(analytics_pb::Overview {
            cafe_comparison: overview
                .cafe_comparison
                .into_iter()
                .map(|c| analytics_pb::CafeSales {
                    cafe: c.cafe,
                    total_sales: decimal_to_wire(c.total_sales),
                })
                .collect(),
            sales_overtime: overview
                .sales_overtime
                .into_iter()
                .map(|d| analytics_pb::DailySales {
                    cafe: d.cafe,
                    date: d.date.format("%Y-%m-%d").to_string(),
                    daily_total: decimal_to_wire(d.daily_total),
                })
                .collect(),
            products_overview: overview
                .products_overview
                .into_iter()
                .map(|c| analytics_pb::CafeProducts {
                    cafe: c.cafe,
                    top_3: products(c.top_3),
                    bottom_3: products(c.bottom_3),
                })
                .collect(),
            category_distribution: overview
                .category_distribution
                .into_iter()
                .map(|c| analytics_pb::CategoryTotal {
                    category: c.category,
                    total: decimal_to_wire(c.total),
                })
                .collect(),
        }))
    }
}

pub type GrpcTraceLayer = TraceLayer<SharedClassifier<GrpcErrorsAsFailures>>;

/// tonic server with the shared limits and tracing applied
pub type GrpcServer = Server<Stack<GrpcTraceLayer, Identity>>;

/// Router holding exactly one of the services above
pub type GrpcRouter = Router<Stack<GrpcTraceLayer, Identity>>;

/// Builds a server with a per-connection concurrency cap and request deadline.
pub fn server(cfg: &GrpcConfig) -> GrpcServer {
    Server::builder()
        .concurrency_limit_per_connection(cfg.concurrency_limit)
        .timeout(cfg.request_timeout())
        .layer(crate::tracing::configure_grpc_tracing())
}

pub fn inventory_router(cfg: &GrpcConfig, svc: InventoryService) -> GrpcRouter {
    server(cfg).add_service(InventoryServiceServer::new(InventoryGrpcService { svc }))
}

pub fn order_router(cfg: &GrpcConfig, svc: OrderService) -> GrpcRouter {
    server(cfg).add_service(OrderServiceServer::new(OrderGrpcService { svc }))
}

pub fn menu_router(cfg: &GrpcConfig, svc: MenuService) -> GrpcRouter {
    server(cfg).add_service(MenuServiceServer::new(MenuGrpcService { svc }))
}

pub fn cafe_router(cfg: &GrpcConfig, svc: CafeService) -> GrpcRouter {
    server(cfg).add_service(CafeServiceServer::new(CafeGrpcService { svc }))
}

pub fn login_router(cfg: &GrpcConfig, svc: LoginService) -> GrpcRouter {
    server(cfg).add_service(LoginServiceServer::new(LoginGrpcService { svc }))
}

pub fn admin_login_router(cfg: &GrpcConfig, svc: AdminLoginService) -> GrpcRouter {
    server(cfg).add_service(AdminLoginServiceServer::new(AdminLoginGrpcService { svc }))
}

pub fn analytics_router(cfg: &GrpcConfig, svc: AnalyticsService) -> GrpcRouter {
    server(cfg).add_service(AnalyticsServiceServer::new(AnalyticsGrpcService { svc }))
}

/// Serves `router` on `addr` until the process receives a shutdown signal.
pub async fn serve(name: &'static str, addr: SocketAddr, router: GrpcRouter) -> anyhow::Result<()> {
    info!(service = name, %addr, "gRPC server listening");
    router
        .serve_with_shutdown(addr, crate::shutdown_signal())
        .await?;
    info!(service = name, "gRPC server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn wire_amounts_must_be_whole_cents() {
        assert_eq!(decimal_from_wire(4.5, "price").unwrap(), dec!(4.50));
        assert_eq!(decimal_from_wire(0.1, "price").unwrap(), dec!(0.10));
        assert_eq!(decimal_from_wire(19.99, "price").unwrap(), dec!(19.99));
        assert_matches!(
            decimal_from_wire(2.999, "price"),
            Err(ServiceError::ValidationError(msg)) if msg.contains("decimal places")
        );
        assert_matches!(
            decimal_from_wire(1e30, "price"),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            decimal_from_wire(f64::NAN, "price"),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(decimal_to_wire(dec!(12.25)), 12.25);
    }

    #[test]
    fn period_requires_a_real_month() {
        let bad = analytics_pb::PeriodRequest { month: -1, year: 2024 };
        assert_matches!(period_from_wire(&bad), Err(ServiceError::ValidationError(_)));

        let ok = analytics_pb::PeriodRequest { month: 2, year: 2024 };
        assert_eq!(period_from_wire(&ok).unwrap(), Period { month: 2, year: 2024 });
    }
}
