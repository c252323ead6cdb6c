use crate::{
    config::GrpcConfig,
    errors::ServiceError,
    proto::{
        admin_login_service_client::AdminLoginServiceClient,
        analytics_service_client::AnalyticsServiceClient, cafe_service_client::CafeServiceClient,
        inventory::UpdateInventoryRequest, inventory_service_client::InventoryServiceClient,
        login_service_client::LoginServiceClient, menu_service_client::MenuServiceClient,
        order_service_client::OrderServiceClient,
    },
    services::orders::StockLedger,
};
use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

/// Channel that dials `url` on first use, with the configured timeouts.
pub fn lazy_channel(url: &str, cfg: &GrpcConfig) -> Result<Channel, ServiceError> {
    let endpoint = Endpoint::from_shared(url.to_string()).map_err(|e| {
        ServiceError::InternalError(format!("Invalid upstream url {}: {}", url, e))
    })?;
    debug!(url, "Configuring lazy gRPC channel");
    Ok(endpoint
        .connect_timeout(cfg.connect_timeout())
        .timeout(cfg.request_timeout())
        .connect_lazy())
}

/// One client per backend service, shared by all gateway handlers.
#[derive(Clone)]
pub struct GatewayClients {
    pub login: LoginServiceClient<Channel>,
    pub order: OrderServiceClient<Channel>,
    pub analytics: AnalyticsServiceClient<Channel>,
    pub cafe: CafeServiceClient<Channel>,
    pub menu: MenuServiceClient<Channel>,
    pub inventory: InventoryServiceClient<Channel>,
    pub admin: AdminLoginServiceClient<Channel>,
}

impl GatewayClients {
    /// Nothing is dialled until the first request; an unreachable backend
    /// surfaces as `UNAVAILABLE` on that request.
    pub fn connect_lazy(cfg: &GrpcConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            login: LoginServiceClient::new(lazy_channel(&cfg.login_url, cfg)?),
            order: OrderServiceClient::new(lazy_channel(&cfg.order_url, cfg)?),
            analytics: AnalyticsServiceClient::new(lazy_channel(&cfg.analytics_url, cfg)?),
            cafe: CafeServiceClient::new(lazy_channel(&cfg.cafe_url, cfg)?),
            menu: MenuServiceClient::new(lazy_channel(&cfg.menu_url, cfg)?),
            inventory: InventoryServiceClient::new(lazy_channel(&cfg.inventory_url, cfg)?),
            admin: AdminLoginServiceClient::new(lazy_channel(&cfg.admin_login_url, cfg)?),
        })
    }
}

/// [`StockLedger`] backed by the remote inventory service.
#[derive(Clone)]
pub struct InventoryLedgerClient {
    client: InventoryServiceClient<Channel>,
}

impl InventoryLedgerClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: InventoryServiceClient::new(channel),
        }
    }

    pub fn connect_lazy(cfg: &GrpcConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(lazy_channel(&cfg.inventory_url, cfg)?))
    }
}

#[async_trait]
impl StockLedger for InventoryLedgerClient {
    async fn decrement_stock(
        &self,
        item_id: i32,
        cafe_id: i32,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        let mut client = self.client.clone();
        let response = client
            .update_inventory_after_order(UpdateInventoryRequest {
                item_id,
                cafe_id,
                quantity_ordered: quantity,
            })
            .await?;
        Ok(response.into_inner().success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn invalid_urls_are_rejected_up_front() {
        let cfg = GrpcConfig::default();
        assert_matches!(
            lazy_channel("not a url", &cfg),
            Err(ServiceError::InternalError(_))
        );
    }

    #[tokio::test]
    async fn unreachable_inventory_is_unavailable() {
        let cfg = GrpcConfig {
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..GrpcConfig::default()
        };
        let ledger = InventoryLedgerClient::new(lazy_channel("http://127.0.0.1:1", &cfg).unwrap());

        let result = ledger.decrement_stock(1, 1, 1).await;
        assert_matches!(result, Err(ServiceError::ServiceUnavailable(_)));
    }
}
